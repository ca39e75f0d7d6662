//! anonshare-core - Core library for the anonshare CLI
//!
//! This library models anonymous file-hosting backends (endpoint templates,
//! request execution, response parsing) and provides preview, upload and
//! download operations with checksums and scoped diagnostic logging.

pub mod checksum;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod logger;
pub mod preview;
pub mod provider;
pub mod request;
pub mod transfer;

// Re-export commonly used types
pub use checksum::{Algorithm, Checksum, Digest};
pub use client::AnonClient;
pub use config::{config_exists, get_config_path, load_config, load_config_or_default, save_config, validate_config};
pub use config::{AdvancedConfig, Config, ConfigFile, ConfigOverrides, LoggingConfig, ProviderConfig};
pub use endpoint::{Endpoint, Operation};
pub use error::{Error, Result};
pub use logger::{Level, LogRecord, LoggerState, ScopedLogger};
pub use preview::PreviewRecord;
pub use provider::{build_provider, CustomProvider, PixelDrain, Provider};
pub use request::{build_user_agent, RequestHandler, RequestLog, RetryPolicy};
pub use transfer::{
    DownloadSink, OverwriteDecision, OverwritePrompt, ProgressCallback, TransferOptions,
    TransferProgress,
};

// Cancellation tokens accepted by `TransferOptions`
pub use tokio_util::sync::CancellationToken;
