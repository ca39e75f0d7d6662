use anonshare_core::{load_config_or_default, ConfigOverrides, Error};
use clap::Parser;
use color_eyre::config::HookBuilder;
use console::style;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod handlers;
mod progress;
mod prompt;

/// Exit status after Ctrl-C, as shells report SIGINT
const EXIT_INTERRUPTED: u8 = 130;

/// anonshare - upload, preview and download files on anonymous file hosts
#[derive(Parser, Debug)]
#[command(name = "anonshare")]
#[command(version)]
#[command(about = "Share files through anonymous file-hosting services", long_about = None)]
struct Cli {
    /// Persist diagnostic logs for this run
    #[arg(long, global = true)]
    logging: bool,

    /// Override the provider API base URL
    #[arg(long, global = true, env = "ANONSHARE_API_URL")]
    api_url: Option<String>,

    /// Read configuration from this file instead of ~/.config/anonshare/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show metadata of remote resources
    Preview {
        /// Resource identifiers
        #[arg(required = true)]
        resources: Vec<String>,
        /// Print the full JSON record
        #[arg(short, long)]
        verbose: bool,
    },

    /// Upload local files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Show progress and the MD5 of each file
        #[arg(short, long)]
        verbose: bool,
    },

    /// Download remote resources
    Download {
        /// Resource identifiers
        resources: Vec<String>,
        /// Read additional identifiers from a file, one per line
        #[arg(short, long)]
        batch_file: Option<PathBuf>,
        /// Destination directory
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Ask before overwriting existing files
        #[arg(short, long)]
        check: bool,
        /// Show progress, file paths and MD5 checksums
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Check the configuration for errors
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    let cli = Cli::parse();

    // RUST_LOG wins over the configured level
    let level = load_config_or_default(cli.config.as_deref())
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let overrides = ConfigOverrides {
        api_url: cli.api_url.clone(),
        enable_logging: cli.logging.then_some(true),
        ..ConfigOverrides::default()
    };

    if let Commands::Config { action } = &cli.command {
        let result = match action {
            ConfigAction::Show => handlers::handle_config_show(cli.config.as_deref(), overrides),
            ConfigAction::Path => handlers::handle_config_path(cli.config.as_deref()),
            ConfigAction::Validate => handlers::handle_config_validate(cli.config.as_deref(), overrides),
        };
        return report(result);
    }

    let mut client = match handlers::build_client(cli.config.as_deref(), overrides) {
        Ok(client) => client,
        Err(e) => return report(Err(e)),
    };

    let cancel = CancellationToken::new();
    let result = until_interrupted(
        run(&client, cli.command, cancel.clone()),
        tokio::signal::ctrl_c(),
        &cancel,
    )
    .await;

    client.shutdown();

    if cancel.is_cancelled() {
        return ExitCode::from(EXIT_INTERRUPTED);
    }
    report(result)
}

/// Drive `command` to completion, cancelling `cancel` if `interrupt` fires first
///
/// The command keeps running after the interrupt so transfers can clean up.
async fn until_interrupted<C, I>(command: C, interrupt: I, cancel: &CancellationToken) -> C::Output
where
    C: Future,
    I: Future,
{
    tokio::pin!(command);
    tokio::select! {
        output = &mut command => output,
        _ = interrupt => {
            cancel.cancel();
            command.await
        }
    }
}

async fn run(
    client: &anonshare_core::AnonClient,
    command: Commands,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Commands::Preview { resources, verbose } => {
            handlers::handle_preview(client, &resources, verbose, &cancel).await
        }
        Commands::Upload { files, verbose } => {
            handlers::handle_upload(client, &files, verbose, &cancel).await
        }
        Commands::Download {
            resources,
            batch_file,
            path,
            check,
            verbose,
        } => {
            let request = handlers::DownloadRequest {
                resources,
                batch_file,
                path,
                check,
                verbose,
            };
            handlers::handle_download(client, request, &cancel).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

/// Map a command outcome to the process exit status
fn report(result: anyhow::Result<()>) -> ExitCode {
    let err = match result {
        Ok(()) => return ExitCode::SUCCESS,
        Err(err) => err,
    };

    match err.downcast_ref::<Error>() {
        Some(Error::Interrupted(_)) | Some(Error::Cancelled) => {
            return ExitCode::from(EXIT_INTERRUPTED);
        }
        Some(core) => {
            if let Some(body) = core.response_body() {
                eprintln!("{}", body);
                return ExitCode::FAILURE;
            }
        }
        None => {}
    }

    eprintln!("{} {:#}", style("error:").red().bold().for_stderr(), err);
    ExitCode::FAILURE
}
