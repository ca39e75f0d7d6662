//! Transfer progress, cancellation and download sinks

use crate::checksum::{Algorithm, Checksum, Digest};
use crate::error::Result;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Progress of a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes sent or received so far
    pub transferred: u64,
    /// Total size, when known
    pub total: Option<u64>,
}

/// Called synchronously as a transfer advances
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Per-operation transfer options
#[derive(Clone, Default)]
pub struct TransferOptions {
    pub progress: Option<ProgressCallback>,
    pub cancel: CancellationToken,
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn report(&self, transferred: u64, total: Option<u64>) {
        if let Some(callback) = &self.progress {
            callback(TransferProgress { transferred, total });
        }
    }
}

impl std::fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOptions")
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// A completed download on disk
///
/// The flushed file handle stays open until [`DownloadSink::close`] or drop.
#[derive(Debug)]
pub struct DownloadSink {
    path: PathBuf,
    len: u64,
    file: Option<File>,
}

impl DownloadSink {
    pub(crate) fn new(path: PathBuf, len: u64, file: File) -> Self {
        Self {
            path,
            len,
            file: Some(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Underlying handle, while still open
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn close(&mut self) {
        self.file.take();
    }

    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }

    pub fn checksum(&self, algorithm: Algorithm) -> Result<Digest> {
        Checksum::compute(&self.path, algorithm)
    }
}

/// Answer to an overwrite question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Proceed,
    Skip,
    Abort,
}

/// Asked before a download replaces an existing file
pub trait OverwritePrompt: Send + Sync {
    fn confirm(&self, path: &Path) -> OverwriteDecision;
}

/// Always answers the same way
impl OverwritePrompt for OverwriteDecision {
    fn confirm(&self, _path: &Path) -> OverwriteDecision {
        *self
    }
}
