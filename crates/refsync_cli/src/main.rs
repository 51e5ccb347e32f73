//! refsync CLI
//!
//! Runs the reconciliation and export jobs against a configured remote.
//!
//! # Commands
//!
//! - `sync [ENTITY...]` - Reconcile all or the named reference entities
//! - `export` - Push pending submissions to the remote side
//! - `serve` - Run both jobs on fixed intervals until Ctrl-C
//!
//! Exit status is 0 on full success, 1 if any error was recorded and 130
//! if a one-shot command was interrupted.

mod commands;
mod error;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Context;
use error::CliError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Exit status when an interrupted one-shot command is abandoned.
const EXIT_INTERRUPTED: u8 = 130;

/// Reference-data sync and submission export for a CRM backend.
#[derive(Parser)]
#[command(name = "refsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Remote endpoint base URL
    #[arg(global = true, long, env = "REFSYNC_ENDPOINT")]
    endpoint: Option<String>,

    /// Path to the SQLite database
    #[arg(global = true, long, env = "REFSYNC_DATABASE", default_value = "refsync.db")]
    database: PathBuf,

    /// Directory holding stored attachments
    #[arg(global = true, long, env = "REFSYNC_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Concurrent reconcilers
    #[arg(global = true, long, env = "REFSYNC_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Output format
    #[arg(global = true, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile reference entities from the remote side
    Sync {
        /// Entities to reconcile (all when omitted)
        entities: Vec<String>,
    },

    /// Export pending submissions
    Export,

    /// Run sync and export on fixed intervals until Ctrl-C
    Serve {
        /// Seconds between sync runs
        #[arg(long, env = "REFSYNC_SYNC_INTERVAL", default_value = "3600", value_parser = parse_seconds)]
        sync_interval: Duration,

        /// Seconds between export runs
        #[arg(long, env = "REFSYNC_EXPORT_INTERVAL", default_value = "300", value_parser = parse_seconds)]
        export_interval: Duration,
    },

    /// Show version information
    Version,
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err("interval must be at least one second".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(format!("invalid number of seconds: {e}")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Failed) => ExitCode::FAILURE,
        Ok(Outcome::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            error!(error = %e, "refsync failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No errors were recorded.
    Success,
    /// At least one error was recorded.
    Failed,
    /// The user interrupted the command.
    Interrupted,
}

impl Outcome {
    fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failed
        }
    }
}

fn run(cli: Cli) -> Result<Outcome, CliError> {
    let command = match cli.command {
        Commands::Version => {
            println!("refsync v{}", env!("CARGO_PKG_VERSION"));
            return Ok(Outcome::Success);
        }
        command => command,
    };

    let endpoint = cli.endpoint.ok_or(CliError::MissingEndpoint)?;
    let context = Context::open(
        &endpoint,
        &cli.database,
        &cli.upload_dir,
        cli.workers,
        cli.format,
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let outcome = match command {
        Commands::Sync { entities } => commands::sync::run(&runtime, context, entities),
        Commands::Export => commands::export::run(&runtime, context),
        Commands::Serve {
            sync_interval,
            export_interval,
        } => commands::serve::run(&runtime, context, sync_interval, export_interval),
        Commands::Version => Ok(Outcome::Success),
    };

    // An interrupted job may still be running on a blocking thread.
    runtime.shutdown_background();
    outcome
}
