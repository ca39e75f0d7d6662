//! Scoped diagnostic logger with named handlers
//!
//! Records are persisted as JSON lines, one file per handler under a base
//! path. Every call is counted and mirrored to `tracing`, but a call made with
//! `hide = true` is never persisted.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

/// A persisted log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
}

/// Lifecycle of a logger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Uninitialized,
    BasePathSet,
    HandlersAttached,
    ShutDown,
}

enum Backend {
    File(PathBuf),
    Memory(Mutex<Vec<LogRecord>>),
}

struct LogHandler {
    name: String,
    backend: Backend,
}

impl LogHandler {
    fn write(&self, record: &LogRecord) -> std::io::Result<()> {
        match &self.backend {
            Backend::File(path) => {
                let mut line = serde_json::to_string(record)?;
                line.push('\n');
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(line.as_bytes())?;
                file.flush()
            }
            Backend::Memory(records) => {
                records
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(record.clone());
                Ok(())
            }
        }
    }
}

/// Diagnostic logger owned by a client
pub struct ScopedLogger {
    path: Option<PathBuf>,
    handlers: Vec<LogHandler>,
    state: LoggerState,
    calls: AtomicUsize,
}

impl Default for ScopedLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedLogger {
    pub fn new() -> Self {
        Self {
            path: None,
            handlers: Vec::new(),
            state: LoggerState::Uninitialized,
            calls: AtomicUsize::new(0),
        }
    }

    /// Set the directory handler files are created in
    ///
    /// Once handlers are attached the path may only be re-set to the same value.
    pub fn set_base_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.ensure_open()?;
        let path = path.as_ref().to_path_buf();

        if !self.handlers.is_empty() {
            if self.path.as_deref() == Some(path.as_path()) {
                return Ok(self);
            }
            return Err(Error::Logger(format!(
                "cannot move base path to {} while handlers are attached",
                path.display()
            )));
        }

        fs::create_dir_all(&path)?;
        self.path = Some(path);
        self.state = LoggerState::BasePathSet;
        Ok(self)
    }

    /// Create (or open) `<base path>/<name>` and attach it
    pub fn add_handler(&mut self, name: &str) -> Result<&mut Self> {
        self.ensure_open()?;
        validate_handler_name(name)?;
        let base = self
            .path
            .clone()
            .ok_or_else(|| Error::Logger("base path not set".to_string()))?;

        if self.handlers.iter().any(|h| h.name == name) {
            return Ok(self);
        }

        let file = base.join(name);
        OpenOptions::new().create(true).append(true).open(&file)?;

        self.handlers.push(LogHandler {
            name: name.to_string(),
            backend: Backend::File(file),
        });
        self.state = LoggerState::HandlersAttached;
        Ok(self)
    }

    /// Attach a handler that keeps its records in memory
    pub fn add_memory_handler(&mut self, name: &str) -> Result<&mut Self> {
        self.ensure_open()?;
        validate_handler_name(name)?;
        if !self.handlers.iter().any(|h| h.name == name) {
            self.handlers.push(LogHandler {
                name: name.to_string(),
                backend: Backend::Memory(Mutex::new(Vec::new())),
            });
        }
        self.state = LoggerState::HandlersAttached;
        Ok(self)
    }

    pub fn debug(&self, message: &str, hide: bool) {
        self.log(Level::Debug, message, hide);
    }

    pub fn info(&self, message: &str, hide: bool) {
        self.log(Level::Info, message, hide);
    }

    pub fn warning(&self, message: &str, hide: bool) {
        self.log(Level::Warning, message, hide);
    }

    pub fn error(&self, message: &str, hide: bool) {
        self.log(Level::Error, message, hide);
    }

    /// Record a call; persist it to every handler unless hidden
    pub fn log(&self, level: Level, message: &str, hide: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
        };

        match level {
            Level::Debug => tracing::debug!(hidden = hide, "{}", record.message),
            Level::Info => tracing::info!(hidden = hide, "{}", record.message),
            Level::Warning => tracing::warn!(hidden = hide, "{}", record.message),
            Level::Error => tracing::error!(hidden = hide, "{}", record.message),
        }

        if hide || self.state == LoggerState::ShutDown {
            return;
        }

        for handler in &self.handlers {
            // Handler failures never reach the caller
            if let Err(e) = handler.write(&record) {
                tracing::warn!(handler = %handler.name, error = %e, "Failed to write log record");
            }
        }
    }

    /// Records currently persisted for `name`, oldest first
    ///
    /// Unknown handlers and missing files yield an empty history.
    pub fn get_log_history(&self, name: &str) -> Vec<LogRecord> {
        if let Some(handler) = self.handlers.iter().find(|h| h.name == name) {
            if let Backend::Memory(records) = &handler.backend {
                return records
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
            }
        }

        let Some(path) = self.handler_path(name) else {
            return Vec::new();
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read log history");
                }
                return Vec::new();
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LogRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed log record");
                    None
                }
            })
            .collect()
    }

    /// Delete the handler's backing file and detach it
    pub fn unlink(&mut self, name: &str) -> Result<()> {
        let path = self.handler_path(name);
        self.handlers.retain(|h| h.name != name);

        if let Some(path) = path {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if self.handlers.is_empty() && self.state == LoggerState::HandlersAttached {
            self.state = if self.path.is_some() {
                LoggerState::BasePathSet
            } else {
                LoggerState::Uninitialized
            };
        }
        Ok(())
    }

    /// Release every handler; later calls are counted but not persisted
    pub fn shutdown(&mut self) {
        if self.state == LoggerState::ShutDown {
            return;
        }
        self.handlers.clear();
        self.state = LoggerState::ShutDown;
    }

    /// Backing file of a file handler, attached or not
    pub fn handler_path(&self, name: &str) -> Option<PathBuf> {
        match self.handlers.iter().find(|h| h.name == name) {
            Some(LogHandler {
                backend: Backend::File(path),
                ..
            }) => Some(path.clone()),
            Some(_) => None,
            None => self.path.as_ref().map(|base| base.join(name)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn state(&self) -> LoggerState {
        self.state
    }

    /// Number of log calls, hidden or not
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// `ShutDown` is final
    fn ensure_open(&self) -> Result<()> {
        if self.state == LoggerState::ShutDown {
            return Err(Error::Logger("logger is shut down".to_string()));
        }
        Ok(())
    }
}

fn validate_handler_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if valid {
        Ok(())
    } else {
        Err(Error::Logger(format!("invalid handler name: {:?}", name)))
    }
}
