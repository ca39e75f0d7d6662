//! Configuration management for anonshare

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration directory name
const CONFIG_DIR: &str = "anonshare";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider selection and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// `pixeldrain` or `custom`
    #[serde(default = "default_provider")]
    pub name: String,

    /// Overrides the provider's base API URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Required for `custom` providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_url: None,
            api_key: None,
            endpoint: None,
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Seconds between received bytes
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    /// Milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: u64,
    /// Upload read size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Persist scoped log records
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    #[serde(default = "default_log_handler")]
    pub handler: String,
    /// `tracing` filter level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_path: None,
            handler: default_log_handler(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Configured base path, or the default data directory
    pub fn resolved_base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(path) => Ok(path.clone()),
            None => default_log_dir(),
        }
    }
}

/// Values taken from the command line or environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub enable_logging: Option<bool>,
    pub log_base_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Apply overrides on top of this configuration
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(api_url) = overrides.api_url {
            self.provider.api_url = Some(api_url);
        }
        if let Some(api_key) = overrides.api_key {
            self.provider.api_key = Some(api_key);
        }
        if let Some(enabled) = overrides.enable_logging {
            self.logging.enabled = enabled;
        }
        if let Some(path) = overrides.log_base_path {
            self.logging.base_path = Some(path);
        }
        self
    }
}

// Default values
fn default_provider() -> String {
    "pixeldrain".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    500
}

fn default_max_retry_delay() -> u64 {
    8000
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_log_handler() -> String {
    "cli.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR))
}

/// Get the configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Default directory for scoped log files
pub fn default_log_dir() -> Result<PathBuf> {
    let data = dirs::data_dir().ok_or_else(|| Error::Config("Cannot determine data directory".to_string()))?;
    Ok(data.join(CONFIG_DIR))
}

/// Load configuration from the default location
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from a specific file
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read config file: {}", e))
    })?;

    let config: ConfigFile = toml::from_str(&content).map_err(|e| {
        Error::InvalidConfig(format!("Failed to parse config file: {}", e))
    })?;

    Ok(config)
}

/// Load configuration, falling back to defaults when no file exists
pub fn load_config_or_default(path: Option<&Path>) -> Result<ConfigFile> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => get_config_path()?,
    };

    match load_config_from(&path) {
        Ok(config) => Ok(config),
        Err(Error::ConfigNotFound(_)) => Ok(ConfigFile::default()),
        Err(e) => Err(e),
    }
}

/// Save configuration to the default location
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let config_dir = get_config_dir()?;
    fs::create_dir_all(&config_dir).map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    save_config_to(config, &config_dir.join(CONFIG_FILE))
}

/// Save configuration to a specific file
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    fs::write(path, content).map_err(|e| {
        Error::Config(format!("Failed to write config file: {}", e))
    })?;

    // May hold an API key: read/write for owner only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    if let Some(api_url) = &config.provider.api_url {
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "API URL must be http(s), got {:?}",
                api_url
            )));
        }
    }

    match config.provider.name.as_str() {
        "pixeldrain" => {}
        "custom" => {
            if config.provider.api_url.is_none() {
                return Err(Error::Config("Custom provider requires api_url".to_string()));
            }
            let endpoint = config.provider.endpoint.as_ref().ok_or_else(|| {
                Error::Config("Custom provider requires an [provider.endpoint] section".to_string())
            })?;
            endpoint.validate()?;
        }
        other => {
            return Err(Error::Config(format!(
                "Unknown provider {:?} (expected pixeldrain or custom)",
                other
            )));
        }
    }

    if config.advanced.connect_timeout == 0 || config.advanced.read_timeout == 0 {
        return Err(Error::InvalidInput("Timeouts must be greater than zero".to_string()));
    }

    if config.advanced.chunk_size == 0 {
        return Err(Error::InvalidInput("Chunk size must be greater than zero".to_string()));
    }

    if config.advanced.retry_delay > config.advanced.max_retry_delay {
        return Err(Error::InvalidInput(
            "retry_delay cannot exceed max_retry_delay".to_string()
        ));
    }

    Ok(())
}

/// Check if configuration exists
pub fn config_exists() -> bool {
    get_config_path().map(|p| p.exists()).unwrap_or(false)
}

/// Public alias for ConfigFile (used by lib.rs)
pub use ConfigFile as Config;
