//! Error types for anonshare-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for anonshare-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for anonshare-core
#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP response
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The remote reported the resource as absent
    #[error("Not found: {target}")]
    NotFound { target: String, body: String },

    /// Malformed response body
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Local file does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint template and identifier do not agree
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Interrupted by the user, e.g. a declined overwrite prompt
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Scoped logger misuse
    #[error("Logger error: {0}")]
    Logger(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled through a cancellation token
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// HTTP status carried by `Http` and `NotFound`
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Raw response body carried by `Http` and `NotFound`
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::Http { body, .. } | Error::NotFound { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether a retry may succeed where this attempt failed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout | Error::Network(_) => true,
            Error::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::Network(err.to_string())
        } else if err.is_builder() || err.is_request() {
            Error::HttpClient(err.to_string())
        } else if err.is_decode() {
            Error::Parse(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
