//! Command handlers for the anonshare CLI

use crate::progress;
use crate::prompt::ConfirmOverwrite;
use anonshare_core::{
    build_user_agent, get_config_path, load_config_or_default, validate_config, Algorithm,
    AnonClient, Checksum, ConfigFile, ConfigOverrides, Error, TransferOptions,
};
use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Arguments of the download command
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub resources: Vec<String>,
    pub batch_file: Option<PathBuf>,
    pub path: PathBuf,
    pub check: bool,
    pub verbose: bool,
}

/// Load, merge and validate the configuration
fn effective_config(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<ConfigFile> {
    let config = load_config_or_default(config_path)?.merge(overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Client for the configured provider
pub fn build_client(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<AnonClient> {
    let config = effective_config(config_path, overrides)?;
    tracing::debug!(
        provider = %config.provider.name,
        logging = config.logging.enabled,
        "Building client"
    );
    let user_agent = build_user_agent(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    Ok(AnonClient::from_config(&config, user_agent)?)
}

/// Handle preview command
pub async fn handle_preview(
    client: &AnonClient,
    resources: &[String],
    verbose: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    for resource in resources {
        ensure_running(cancel)?;
        let record = client.preview(resource).await?;
        if verbose {
            println!("{}", record.to_pretty_json()?);
        } else {
            println!("{}", record.values_line());
        }
    }
    Ok(())
}

/// Handle upload command
pub async fn handle_upload(
    client: &AnonClient,
    files: &[PathBuf],
    verbose: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    for file in files {
        ensure_running(cancel)?;
        let bar = verbose.then(|| progress::transfer_bar(&display_name(file)));
        let mut options = TransferOptions::new().with_cancel(cancel.clone());
        if let Some(bar) = &bar {
            options = options.with_progress(progress::report_to(bar));
        }

        let result = client.upload(file, &options).await;
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }
        let record = result?;
        let id = record.id.as_deref().unwrap_or_default();

        if verbose {
            println!("id\t{}", id);
            let digest = Checksum::compute(file, Algorithm::Md5)?;
            println!("md5\t{}", Checksum::hash2string(&digest));
        } else {
            println!("{}", id);
        }
    }
    Ok(())
}

/// Handle download command
pub async fn handle_download(
    client: &AnonClient,
    request: DownloadRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut resources = request.resources;
    if let Some(batch_file) = &request.batch_file {
        resources.extend(read_batch_file(batch_file)?);
    }
    if resources.is_empty() {
        anyhow::bail!("No resource given (pass identifiers or --batch-file)");
    }

    for resource in &resources {
        ensure_running(cancel)?;
        let bar = request.verbose.then(|| progress::transfer_bar(resource));
        let mut options = TransferOptions::new().with_cancel(cancel.clone());
        if let Some(bar) = &bar {
            options = options.with_progress(progress::report_to(bar));
        }

        let result = if request.check {
            client
                .download_checked(resource, &request.path, &options, &ConfirmOverwrite)
                .await
        } else {
            client.download(resource, &request.path, &options).await.map(Some)
        };
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }

        let Some(mut sink) = result? else {
            if request.verbose {
                println!("skip\t{}", resource);
            }
            continue;
        };
        sink.close();

        if request.verbose {
            println!("file\t{}", sink.path().display());
            let digest = sink.checksum(Algorithm::Md5)?;
            println!("md5\t{}", Checksum::hash2string(&digest));
        }
    }
    Ok(())
}

/// Identifiers listed one per line, blank lines ignored
pub fn read_batch_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read batch file {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Handle config show
pub fn handle_config_show(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<()> {
    let config = load_config_or_default(config_path)?.merge(overrides);

    println!("{}", style("Provider:").bold());
    println!("  Name: {}", config.provider.name);
    println!(
        "  API URL: {}",
        config.provider.api_url.as_deref().unwrap_or("(provider default)")
    );
    println!(
        "  API key: {}",
        if config.provider.api_key.is_some() { "set" } else { "none" }
    );
    println!();
    println!("{}", style("Advanced:").bold());
    println!("  Connect timeout: {}s", config.advanced.connect_timeout);
    println!("  Read timeout: {}s", config.advanced.read_timeout);
    println!("  Max retries: {}", config.advanced.max_retries);
    println!(
        "  Retry delay: {}ms (max {}ms)",
        config.advanced.retry_delay, config.advanced.max_retry_delay
    );
    println!("  Chunk size: {}", format_bytes(config.advanced.chunk_size as u64));
    println!();
    println!("{}", style("Logging:").bold());
    println!("  Enabled: {}", config.logging.enabled);
    match config.logging.resolved_base_path() {
        Ok(path) => println!("  Directory: {}", path.display()),
        Err(_) => println!("  Directory: (unavailable)"),
    }
    println!("  Handler: {}", config.logging.handler);

    Ok(())
}

/// Handle config path
pub fn handle_config_path(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => get_config_path()?,
    };
    println!("{}", path.display());
    Ok(())
}

/// Handle config validate
pub fn handle_config_validate(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<()> {
    effective_config(config_path, overrides)?;
    println!("  ✅ Valid configuration");
    Ok(())
}

/// Stop a batch once an interrupt has been seen
fn ensure_running(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled.into());
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format bytes to human readable
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
