//! HTTP request execution with retries, streaming and request logging

use crate::config::AdvancedConfig;
use crate::error::{Error, Result};
use crate::logger::ScopedLogger;
use crate::transfer::TransferOptions;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// Build a `<package>/<version>` user agent token
pub fn build_user_agent(package: &str, version: &str) -> String {
    format!("{}/{}", package, version)
}

/// User agent of this library
pub fn default_user_agent() -> String {
    build_user_agent(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AdvancedConfig::default())
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &AdvancedConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay),
            max_delay: Duration::from_millis(config.max_retry_delay),
        }
    }

    /// Sleep before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Where request diagnostics go; `hide` mirrors a disabled client toggle
#[derive(Clone, Copy)]
pub struct RequestLog<'a> {
    logger: Option<&'a ScopedLogger>,
    hide: bool,
}

impl<'a> RequestLog<'a> {
    pub fn new(logger: &'a ScopedLogger, enable_logging: bool) -> Self {
        Self {
            logger: Some(logger),
            hide: !enable_logging,
        }
    }

    /// Only `tracing` output
    pub fn none() -> Self {
        Self {
            logger: None,
            hide: true,
        }
    }

    pub fn debug(&self, message: &str) {
        match self.logger {
            Some(logger) => logger.debug(message, self.hide),
            None => tracing::debug!("{}", message),
        }
    }
}

/// Executes provider requests
pub struct RequestHandler {
    http_client: Client,
    user_agent: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl RequestHandler {
    /// Create a handler with default timeouts and retries
    pub fn new(user_agent: impl Into<String>) -> Result<Self> {
        Self::from_config(user_agent, &AdvancedConfig::default(), None)
    }

    pub fn from_config(
        user_agent: impl Into<String>,
        config: &AdvancedConfig,
        api_key: Option<String>,
    ) -> Result<Self> {
        let user_agent = user_agent.into();
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .read_timeout(Duration::from_secs(config.read_timeout))
            .build()?;

        Ok(Self {
            http_client,
            user_agent,
            api_key,
            retry: RetryPolicy::from_config(config),
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// GET `url` and return the body as text
    pub async fn get_text(&self, url: &str, log: RequestLog<'_>) -> Result<String> {
        log.debug(&format!("GET {}", url));

        let response = self
            .with_retry(url, log, None, || {
                let request = self.authorize(self.http_client.get(url));
                async move { check_status(request.send().await?, url).await }
            })
            .await
            .inspect_err(|e| log.debug(&format!("GET {} failed: {}", url, e)))?;

        log.debug(&format!("GET {} -> {}", url, response.status()));
        Ok(response.text().await?)
    }

    /// POST a file as multipart field `field`, streaming it from disk
    pub async fn post_file(
        &self,
        url: &str,
        field: &str,
        path: &Path,
        options: &TransferOptions,
        log: RequestLog<'_>,
    ) -> Result<String> {
        let total = tokio::fs::metadata(path)
            .await
            .map_err(|e| open_error(path, e))?
            .len();

        log.debug(&format!("POST {} ({} bytes from {})", url, total, path.display()));

        // Highest count reported so far, shared by every attempt
        let reported = Arc::new(AtomicU64::new(0));

        let response = self
            .with_retry(url, log, Some(&options.cancel), || {
                let request = self.authorize(self.http_client.post(url));
                let chunk_size = self.chunk_size;
                let reported = reported.clone();
                async move {
                    let form = file_form(field, path, total, chunk_size, options, reported).await?;
                    let response = request
                        .multipart(form)
                        .send()
                        .await
                        .map_err(|e| cancelled_or(e, &options.cancel))?;
                    check_status(response, url).await
                }
            })
            .await
            .inspect_err(|e| log.debug(&format!("POST {} failed: {}", url, e)))?;

        log.debug(&format!("POST {} -> {}, sent {} bytes", url, response.status(), total));
        Ok(response.text().await?)
    }

    /// GET `url` and stream the body into `sink`, returning the bytes written
    pub async fn download_to<W>(
        &self,
        url: &str,
        sink: &mut W,
        options: &TransferOptions,
        log: RequestLog<'_>,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        log.debug(&format!("GET {}", url));

        let response = self
            .with_retry(url, log, Some(&options.cancel), || {
                let request = self.authorize(self.http_client.get(url));
                async move { check_status(request.send().await?, url).await }
            })
            .await
            .inspect_err(|e| log.debug(&format!("GET {} failed: {}", url, e)))?;

        let total = response.content_length();
        log.debug(&format!("GET {} -> {}", url, response.status()));

        let mut stream = response.bytes_stream();
        let mut received = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = options.cancel.cancelled() => return Err(Error::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            sink.write_all(&chunk).await?;
            received += chunk.len() as u64;
            options.report(received, total);
        }

        sink.flush().await?;
        log.debug(&format!("Received {} bytes from {}", received, url));
        Ok(received)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.basic_auth("", Some(key)),
            None => request,
        }
    }

    async fn with_retry<F, Fut>(
        &self,
        url: &str,
        log: RequestLog<'_>,
        cancel: Option<&CancellationToken>,
        mut send: F,
    ) -> Result<Response>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let mut attempt = 0;
        loop {
            match send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(url, attempt, error = %e, "Transient failure, retrying in {:?}", delay);
                    log.debug(&format!(
                        "Retry {}/{} for {} in {:?}: {}",
                        attempt, self.retry.max_retries, url, delay, e
                    ));

                    match cancel {
                        Some(cancel) => tokio::select! {
                            _ = cancel.cancelled() => return Err(Error::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        },
                        None => tokio::time::sleep(delay).await,
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map non-success statuses to `NotFound` or `Http`
async fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 404 {
        Err(Error::NotFound {
            target: url.to_string(),
            body,
        })
    } else {
        Err(Error::Http {
            status: status.as_u16(),
            body,
        })
    }
}

async fn file_form(
    field: &str,
    path: &Path,
    total: u64,
    chunk_size: usize,
    options: &TransferOptions,
    reported: Arc<AtomicU64>,
) -> Result<Form> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| open_error(path, e))?;

    let options = options.clone();
    let mut sent = 0u64;
    let stream = ReaderStream::with_capacity(file, chunk_size).map(move |chunk| {
        if options.cancel.is_cancelled() {
            return Err(std::io::Error::new(ErrorKind::Interrupted, "upload cancelled"));
        }
        if let Ok(bytes) = &chunk {
            sent += bytes.len() as u64;
            // A retried attempt stays silent until it passes the previous one
            if reported.fetch_max(sent, AtomicOrdering::Relaxed) < sent {
                options.report(sent, Some(total));
            }
        }
        chunk
    });

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let part = Part::stream_with_length(Body::wrap_stream(stream), total)
        .file_name(file_name)
        .mime_str(mime.as_ref())?;

    Ok(Form::new().part(field.to_string(), part))
}

fn open_error(path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(err),
    }
}

fn cancelled_or(err: reqwest::Error, cancel: &CancellationToken) -> Error {
    if cancel.is_cancelled() {
        Error::Cancelled
    } else {
        err.into()
    }
}
