//! File-hosting providers
//!
//! A provider is an [`Endpoint`] plus a base API URL and the rules for
//! reading that backend's JSON replies.

use crate::config::ProviderConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::preview::PreviewRecord;
use serde_json::Value;

/// A file-hosting backend
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn api_url(&self) -> &str;

    fn endpoint(&self) -> &Endpoint;

    /// Multipart field carrying the uploaded file
    fn upload_field(&self) -> &str {
        "file"
    }

    fn parse_preview(&self, _resource: &str, body: &str) -> Result<PreviewRecord> {
        PreviewRecord::from_json(body)
    }

    fn parse_upload(&self, body: &str) -> Result<PreviewRecord> {
        PreviewRecord::from_json(body)
    }
}

impl<P: Provider + ?Sized> Provider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn api_url(&self) -> &str {
        (**self).api_url()
    }

    fn endpoint(&self) -> &Endpoint {
        (**self).endpoint()
    }

    fn upload_field(&self) -> &str {
        (**self).upload_field()
    }

    fn parse_preview(&self, resource: &str, body: &str) -> Result<PreviewRecord> {
        (**self).parse_preview(resource, body)
    }

    fn parse_upload(&self, body: &str) -> Result<PreviewRecord> {
        (**self).parse_upload(body)
    }
}

/// pixeldrain.com
#[derive(Debug, Clone)]
pub struct PixelDrain {
    api_url: String,
    endpoint: Endpoint,
}

impl PixelDrain {
    pub const NAME: &'static str = "pixeldrain";
    pub const API_URL: &'static str = "https://pixeldrain.com/api/";

    pub fn new() -> Self {
        Self::with_api_url(Self::API_URL)
    }

    /// Same API served from another base URL
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            endpoint: Endpoint::builtin("/file", "/file/{}/info", "/file/{}"),
        }
    }

    /// Reject `{"success": false, ...}` envelopes delivered with a 2xx status
    fn check_envelope(record: &PreviewRecord, resource: &str, body: &str) -> Result<()> {
        if record.success != Some(false) {
            return Ok(());
        }

        let value = record
            .extra
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if value.contains("not_found") {
            Err(Error::NotFound {
                target: resource.to_string(),
                body: body.to_string(),
            })
        } else {
            Err(Error::Http {
                status: 200,
                body: body.to_string(),
            })
        }
    }
}

impl Default for PixelDrain {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for PixelDrain {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn parse_preview(&self, resource: &str, body: &str) -> Result<PreviewRecord> {
        let record = PreviewRecord::from_json(body)?;
        Self::check_envelope(&record, resource, body)?;
        Ok(record)
    }

    fn parse_upload(&self, body: &str) -> Result<PreviewRecord> {
        let mut record = PreviewRecord::from_json(body)?;
        Self::check_envelope(&record, "upload", body)?;

        if record.id.is_none() {
            return Err(Error::Parse("upload reply carries no file id".to_string()));
        }
        record.success.get_or_insert(true);
        Ok(record)
    }
}

/// Any backend following the generic JSON conventions
#[derive(Debug, Clone)]
pub struct CustomProvider {
    api_url: String,
    endpoint: Endpoint,
}

impl CustomProvider {
    pub const NAME: &'static str = "custom";

    pub fn new(api_url: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            api_url: api_url.into(),
            endpoint,
        }
    }
}

impl Provider for CustomProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Select the configured provider
pub fn build_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match config.name.as_str() {
        PixelDrain::NAME => Ok(Box::new(match &config.api_url {
            Some(url) => PixelDrain::with_api_url(url.clone()),
            None => PixelDrain::new(),
        })),
        CustomProvider::NAME => {
            let api_url = config
                .api_url
                .clone()
                .ok_or_else(|| Error::Config("Custom provider requires api_url".to_string()))?;
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| Error::Config("Custom provider requires an endpoint".to_string()))?;
            endpoint.validate()?;
            Ok(Box::new(CustomProvider::new(api_url, endpoint)))
        }
        other => Err(Error::Config(format!("Unknown provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Operation;

    #[test]
    fn test_pixeldrain_endpoint_is_valid() {
        let provider = PixelDrain::new();
        assert!(provider.endpoint().validate().is_ok());
        assert_eq!(
            provider
                .endpoint()
                .resolve(provider.api_url(), Operation::Preview, Some("abc123"))
                .unwrap(),
            "https://pixeldrain.com/api/file/abc123/info"
        );
    }

    #[test]
    fn test_pixeldrain_not_found_envelope() {
        let body = r#"{"success": false, "value": "not_found", "message": "The entity you requested could not be found"}"#;
        let err = PixelDrain::new().parse_preview("nope", body).unwrap_err();
        match err {
            Error::NotFound { target, body: raw } => {
                assert_eq!(target, "nope");
                assert_eq!(raw, body);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_pixeldrain_other_failure_envelope() {
        let err = PixelDrain::new()
            .parse_preview("x", r#"{"success": false, "value": "rate_limited"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Http { status: 200, .. }));
    }

    #[test]
    fn test_pixeldrain_upload_without_success_key() {
        let record = PixelDrain::new().parse_upload(r#"{"id": "abc123"}"#).unwrap();
        assert!(record.is_success());
        assert_eq!(record.id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_pixeldrain_upload_without_id() {
        assert!(matches!(
            PixelDrain::new().parse_upload(r#"{"success": true}"#),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_custom_provider_keeps_reply() {
        let provider = CustomProvider::new(
            "https://mock.provider.com/api/",
            Endpoint::new("/file", "/file/{}/info", "/file/{}").unwrap(),
        );
        let record = provider.parse_upload(r#"{"success": true}"#).unwrap();
        assert!(record.is_success());
        assert!(record.id.is_none());
    }

    #[test]
    fn test_build_provider() {
        let provider = build_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "pixeldrain");
        assert_eq!(provider.api_url(), PixelDrain::API_URL);

        let custom = ProviderConfig {
            name: "custom".to_string(),
            api_url: Some("http://localhost:1234".to_string()),
            api_key: None,
            endpoint: Some(Endpoint::new("/up", "/info/{}", "/get/{}").unwrap()),
        };
        let provider = build_provider(&custom).unwrap();
        assert_eq!(provider.name(), "custom");
        assert_eq!(provider.endpoint().template(Operation::Upload), "/up");

        let unknown = ProviderConfig {
            name: "nope".to_string(),
            ..ProviderConfig::default()
        };
        assert!(build_provider(&unknown).is_err());
    }
}
