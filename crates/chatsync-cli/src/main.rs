//! chatsync CLI
//!
//! Command-line trigger for syncing chat state with a remote store.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chatsync_core::Config;

mod commands;
mod output;

use output::{report_error, Output, OutputFormat};

/// Environment variable holding the log filter
const LOG_ENV: &str = "CHATSYNC_LOG";

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "chatsync - Sync chat sessions across devices")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (overrides CHATSYNC_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync local state with the remote store
    Sync,
    /// Check that the remote store is reachable
    Check,
    /// Export QA transcripts as JSON files
    Export {
        /// Output directory (defaults to <data_dir>/exports)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Merge a snapshot file into local state
    Import {
        /// Snapshot JSON file
        file: PathBuf,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show sync status and local contents
    Status,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g. provider, webdav.endpoint, user_name)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::from_flags(cli.json, cli.quiet);

    match run(cli, &Output::new(format)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(format, &e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_ref();

    let config = Config::load_with_cli_override(config_path)?;
    init_logging(&config);
    debug!("Using data directory {:?}", config.data_dir);

    // Config commands don't need the sync service up front
    if let Commands::Config { command } = cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, output)
            }
        };
    }

    let service = commands::open_service(&config)?;

    match cli.command {
        Commands::Sync => commands::sync::sync(&service, output).await,
        Commands::Check => commands::sync::check(&service, output).await,
        Commands::Export { out } => {
            let out_dir = out.unwrap_or_else(|| config.export_dir());
            commands::export::export(&service, out_dir, output)
        }
        Commands::Import { file } => commands::import::import(&service, file, output),
        Commands::Status => commands::status::show(&config, &service, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Initialize tracing from `CHATSYNC_LOG`
///
/// Logs go to `log_file` when configured, otherwise to stderr. Defaults to
/// warnings only.
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(ref log_path) = config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
