//! Endpoint templates for provider operations

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the resource identifier
const PLACEHOLDER: &str = "{}";

/// Operation kinds an endpoint describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Preview,
    Download,
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Upload => "upload",
            Operation::Preview => "preview",
            Operation::Download => "download",
        }
    }

    /// Number of identifiers the template for this operation takes
    fn arity(&self) -> usize {
        match self {
            Operation::Upload => 0,
            Operation::Preview | Operation::Download => 1,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// URL path templates for upload, preview and download
///
/// Templates use `{}` for the resource identifier, e.g. `/file/{}/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    upload: String,
    preview: String,
    download: String,
}

impl Endpoint {
    /// Create an endpoint, validating every template against its operation
    pub fn new(
        upload: impl Into<String>,
        preview: impl Into<String>,
        download: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Self {
            upload: upload.into(),
            preview: preview.into(),
            download: download.into(),
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    /// Built-in templates, covered by tests instead of runtime validation
    pub(crate) fn builtin(upload: &str, preview: &str, download: &str) -> Self {
        Self {
            upload: upload.to_string(),
            preview: preview.to_string(),
            download: download.to_string(),
        }
    }

    /// Check that every template is a relative fragment with the right placeholder count
    pub fn validate(&self) -> Result<()> {
        for op in [Operation::Upload, Operation::Preview, Operation::Download] {
            let template = self.template(op);

            if template.trim().is_empty() {
                return Err(Error::InvalidEndpoint(format!("{} template is empty", op)));
            }
            if template.contains("://") || template.contains('?') || template.contains('#') {
                return Err(Error::InvalidEndpoint(format!(
                    "{} template is not a relative path: {:?}",
                    op, template
                )));
            }

            let count = template.matches(PLACEHOLDER).count();
            if count != op.arity() {
                return Err(Error::InvalidEndpoint(format!(
                    "{} template {:?} takes {} identifier(s), expected {}",
                    op,
                    template,
                    count,
                    op.arity()
                )));
            }
        }
        Ok(())
    }

    /// Raw template for an operation
    pub fn template(&self, op: Operation) -> &str {
        match op {
            Operation::Upload => &self.upload,
            Operation::Preview => &self.preview,
            Operation::Download => &self.download,
        }
    }

    /// Format the template for `op`, substituting `resource` when required
    pub fn path(&self, op: Operation, resource: Option<&str>) -> Result<String> {
        let template = self.template(op);

        match (op.arity(), resource) {
            (0, None) => Ok(template.to_string()),
            (0, Some(resource)) => Err(Error::InvalidEndpoint(format!(
                "{} takes no resource identifier, got {:?}",
                op, resource
            ))),
            (_, None) => Err(Error::InvalidEndpoint(format!(
                "{} requires a resource identifier",
                op
            ))),
            (_, Some(resource)) => {
                validate_identifier(resource)?;
                Ok(template.replacen(PLACEHOLDER, resource, 1))
            }
        }
    }

    /// Join `base_url` with the formatted template for `op`
    pub fn resolve(&self, base_url: &str, op: Operation, resource: Option<&str>) -> Result<String> {
        let path = self.path(op, resource)?;
        Ok(join_url(base_url, &path))
    }
}

/// Identifiers are opaque, but must fit in a single path segment
fn validate_identifier(resource: &str) -> Result<()> {
    if resource.is_empty() {
        return Err(Error::InvalidEndpoint("empty resource identifier".to_string()));
    }
    if resource
        .chars()
        .any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace())
    {
        return Err(Error::InvalidEndpoint(format!(
            "resource identifier {:?} is not a single path segment",
            resource
        )));
    }
    if resource.contains(PLACEHOLDER) {
        return Err(Error::InvalidEndpoint(format!(
            "resource identifier {:?} contains a template placeholder",
            resource
        )));
    }
    Ok(())
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
