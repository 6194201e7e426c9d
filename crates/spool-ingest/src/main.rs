//! Spool Ingest - resumable spool directory ingestion tool

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use spool_common::logging::{init_logging, LogConfig, LogLevel};
use spool_ingest::runner::{run_spool, RunOptions};
use spool_ingest::{FileCheckpointStore, IngestConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Checkpoint file used when none is given
const DEFAULT_CHECKPOINT_FILE: &str = "spool.offset";

#[derive(Parser, Debug)]
#[command(name = "spool-ingest")]
#[command(author, version, about = "Resumable spool directory ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Ingest the spool directory, writing records as JSON lines
    Spool {
        /// Configuration file
        #[arg(short, long, env = "SPOOL_CONFIG")]
        config: PathBuf,

        /// Checkpoint file
        #[arg(long, default_value = DEFAULT_CHECKPOINT_FILE)]
        checkpoint: PathBuf,

        /// Output file, appended to (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run a single produce cycle
        #[arg(long)]
        once: bool,

        /// Records requested per cycle (defaults to the configured batch size)
        #[arg(long)]
        max_batch_size: Option<usize>,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Configuration file
        #[arg(short, long, env = "SPOOL_CONFIG")]
        config: PathBuf,
    },
}

fn load_config(path: &Path) -> Result<IngestConfig> {
    let config = IngestConfig::from_file(path)?.normalize();
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Environment variables configure logging, --verbose raises the level
    let mut log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::builder()
            .log_file_prefix("spool-ingest")
            .build()
    });
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Spool {
            config,
            checkpoint,
            output,
            once,
            max_batch_size,
        } => {
            let ingest_config = load_config(&config)?;
            let store = FileCheckpointStore::new(checkpoint);
            let options = RunOptions {
                max_batch_size: max_batch_size.unwrap_or(ingest_config.spool.batch_size),
                once,
            };

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing the current cycle");
                    signal_token.cancel();
                }
            });

            let writer: Box<dyn Write> = match output {
                Some(path) => Box::new(
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .with_context(|| format!("Failed to open output file {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout().lock()),
            };

            let stats = run_spool(&ingest_config, &store, writer, options, shutdown).await?;
            info!(records = stats.records, errors = stats.errors, "Ingestion complete");
        }
        Command::CheckConfig { config } => {
            let ingest_config = load_config(&config)?;
            let rendered = toml::to_string_pretty(&ingest_config).context("Failed to render configuration")?;
            println!("{rendered}");
            info!("Configuration is valid");
        }
    }

    Ok(())
}
