//! Provider client: preview, upload and download against one backend

use crate::config::ConfigFile;
use crate::endpoint::Operation;
use crate::error::{Error, Result};
use crate::logger::ScopedLogger;
use crate::preview::PreviewRecord;
use crate::provider::{build_provider, Provider};
use crate::request::{RequestHandler, RequestLog};
use crate::transfer::{DownloadSink, OverwriteDecision, OverwritePrompt, TransferOptions};
use std::path::{Path, PathBuf};

/// Client bound to a single provider
pub struct AnonClient<P: Provider = Box<dyn Provider>> {
    provider: P,
    requests: RequestHandler,
    logger: ScopedLogger,
    enable_logging: bool,
}

impl AnonClient<Box<dyn Provider>> {
    /// Build the configured provider, transport and logger
    ///
    /// A log directory that cannot be prepared leaves the client without
    /// handlers instead of failing construction.
    pub fn from_config(config: &ConfigFile, user_agent: impl Into<String>) -> Result<Self> {
        let provider = build_provider(&config.provider)?;
        let requests = RequestHandler::from_config(
            user_agent,
            &config.advanced,
            config.provider.api_key.clone(),
        )?;

        let mut logger = ScopedLogger::new();
        let attached = config
            .logging
            .resolved_base_path()
            .and_then(|path| {
                logger
                    .set_base_path(&path)?
                    .add_handler(&config.logging.handler)
                    .map(|_| ())
            });
        if let Err(e) = attached {
            tracing::warn!(error = %e, "Scoped logging unavailable");
        }

        Ok(Self::new(provider, requests, logger).with_logging(config.logging.enabled))
    }
}

impl<P: Provider> AnonClient<P> {
    pub fn new(provider: P, requests: RequestHandler, logger: ScopedLogger) -> Self {
        Self {
            provider,
            requests,
            logger,
            enable_logging: false,
        }
    }

    pub fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut ScopedLogger {
        &mut self.logger
    }

    pub fn enable_logging(&self) -> bool {
        self.enable_logging
    }

    pub fn set_logging(&mut self, enable_logging: bool) {
        self.enable_logging = enable_logging;
    }

    /// Fully qualified URL for an operation
    pub fn url(&self, op: Operation, resource: Option<&str>) -> Result<String> {
        self.provider
            .endpoint()
            .resolve(self.provider.api_url(), op, resource)
    }

    /// Fetch metadata for a remote resource
    pub async fn preview(&self, resource: &str) -> Result<PreviewRecord> {
        let url = self.url(Operation::Preview, Some(resource))?;
        self.trace(&format!("Preview {} via {}", resource, self.provider.name()));

        let body = self
            .requests
            .get_text(&url, self.request_log())
            .await
            .map_err(|e| name_missing(e, resource))?;

        self.provider.parse_preview(resource, &body)
    }

    /// Upload a local file
    pub async fn upload(&self, path: impl AsRef<Path>, options: &TransferOptions) -> Result<PreviewRecord> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(Error::InvalidInput(format!("Not a file: {}", path.display())));
        }

        let url = self.url(Operation::Upload, None)?;
        self.trace(&format!("Upload {} via {}", path.display(), self.provider.name()));

        let body = self
            .requests
            .post_file(&url, self.provider.upload_field(), path, options, self.request_log())
            .await?;
        let record = self.provider.parse_upload(&body)?;

        self.trace(&format!(
            "Uploaded {} as {}",
            path.display(),
            record.id.as_deref().unwrap_or("<no id>")
        ));
        Ok(record)
    }

    /// Download a resource into `destination`, replacing any existing file
    pub async fn download(
        &self,
        resource: &str,
        destination: impl AsRef<Path>,
        options: &TransferOptions,
    ) -> Result<DownloadSink> {
        let target = self.download_target(resource, destination.as_ref()).await?;
        self.download_into(resource, target, options).await
    }

    /// Like [`download`](Self::download), but asks `prompt` before replacing a file
    ///
    /// Returns `Ok(None)` when the prompt skips the resource.
    pub async fn download_checked(
        &self,
        resource: &str,
        destination: impl AsRef<Path>,
        options: &TransferOptions,
        prompt: &dyn OverwritePrompt,
    ) -> Result<Option<DownloadSink>> {
        let target = self.download_target(resource, destination.as_ref()).await?;

        if target.exists() {
            match prompt.confirm(&target) {
                OverwriteDecision::Proceed => {}
                OverwriteDecision::Skip => {
                    self.trace(&format!("Skipped {}: {} exists", resource, target.display()));
                    return Ok(None);
                }
                OverwriteDecision::Abort => {
                    return Err(Error::Interrupted(format!(
                        "declined to overwrite {}",
                        target.display()
                    )));
                }
            }
        }

        self.download_into(resource, target, options).await.map(Some)
    }

    /// Release logger handlers
    pub fn shutdown(&mut self) {
        self.logger.shutdown();
    }

    /// Destination file for `resource`, named after its preview
    async fn download_target(&self, resource: &str, destination: &Path) -> Result<PathBuf> {
        let metadata = tokio::fs::metadata(destination).await?;
        if !metadata.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a directory", destination.display()),
            )));
        }
        if metadata.permissions().readonly() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{} is not writable", destination.display()),
            )));
        }

        let record = self.preview(resource).await?;
        let file_name = record
            .name
            .as_deref()
            .and_then(safe_file_name)
            .unwrap_or_else(|| resource.to_string());

        Ok(destination.join(file_name))
    }

    /// Stream into a hidden temp file beside `target` and rename it into place
    ///
    /// An existing `target` is only replaced once the transfer has succeeded.
    async fn download_into(
        &self,
        resource: &str,
        target: PathBuf,
        options: &TransferOptions,
    ) -> Result<DownloadSink> {
        let url = self.url(Operation::Download, Some(resource))?;
        let directory = target
            .parent()
            .ok_or_else(|| Error::InvalidInput(format!("No parent directory for {}", target.display())))?;
        self.trace(&format!("Download {} to {}", resource, target.display()));

        // Removed on drop, including when the future is dropped mid-transfer
        let mut builder = tempfile::Builder::new();
        builder.prefix(".").suffix(".part");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Same mode as a plain create, umask applied
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let (staged, staged_path) = builder.tempfile_in(directory)?.into_parts();
        let mut file = tokio::fs::File::from_std(staged);

        let len = self
            .requests
            .download_to(&url, &mut file, options, self.request_log())
            .await
            .map_err(|e| name_missing(e, resource))?;

        let file = file.into_std().await;
        staged_path
            .persist(&target)
            .map_err(|e| Error::Io(e.error))?;

        self.trace(&format!("Wrote {} bytes to {}", len, target.display()));
        Ok(DownloadSink::new(target, len, file))
    }

    fn request_log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.logger, self.enable_logging)
    }

    fn trace(&self, message: &str) {
        self.logger.debug(message, !self.enable_logging);
    }
}

/// Report `NotFound` against the resource rather than the URL
fn name_missing(err: Error, resource: &str) -> Error {
    match err {
        Error::NotFound { body, .. } => Error::NotFound {
            target: resource.to_string(),
            body,
        },
        other => other,
    }
}

/// Final path component of a provider-reported name
fn safe_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PixelDrain;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("foo.txt").as_deref(), Some("foo.txt"));
        assert_eq!(safe_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(safe_file_name("dir/"), Some("dir".to_string()));
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name(""), None);
    }

    #[test]
    fn test_client_urls() {
        let client = AnonClient::new(
            PixelDrain::with_api_url("http://localhost:9000/api"),
            RequestHandler::new("anonshare-test/0").unwrap(),
            ScopedLogger::new(),
        );
        assert_eq!(
            client.url(Operation::Download, Some("abc123")).unwrap(),
            "http://localhost:9000/api/file/abc123"
        );
        assert!(client.url(Operation::Preview, None).is_err());
        assert!(!client.enable_logging());
    }

    #[test]
    fn test_from_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigFile::default();
        config.logging.base_path = Some(dir.path().to_path_buf());
        config.logging.enabled = true;

        let mut client = AnonClient::from_config(&config, "anonshare/0.1.0").unwrap();
        assert_eq!(client.provider().name(), "pixeldrain");
        assert!(client.enable_logging());
        assert!(dir.path().join("cli.log").exists());

        client.shutdown();
        client.shutdown();
        assert!(client.logger().handler_names().is_empty());
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = AnonClient::new(
            PixelDrain::with_api_url("http://127.0.0.1:9/api"),
            RequestHandler::new("anonshare-test/0").unwrap(),
            ScopedLogger::new(),
        );
        let err = client
            .upload(dir.path().join("foo.txt"), &TransferOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_download_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let client = AnonClient::new(
            PixelDrain::with_api_url("http://127.0.0.1:9/api"),
            RequestHandler::new("anonshare-test/0").unwrap(),
            ScopedLogger::new(),
        );
        let err = client
            .download("abc123", dir.path().join("absent"), &TransferOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
