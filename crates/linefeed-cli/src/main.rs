//! linefeed - OVAPI public transport line pipeline
//!
//! Fetches the OVAPI line feed and upserts it into the warehouse through a
//! date-scoped staging table.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "linefeed")]
#[command(about = "OVAPI public transport line pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./linefeed.toml or ~/.config/linefeed/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Deadline in seconds for the feed request
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline for one logical date
    Run(cmd::run::RunArgs),
    /// Drop the staging table and remove artifacts of one date
    Clean(cmd::clean::CleanArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(linefeed_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the stage line shows activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    linefeed_core::init_logging(quiet, cli.debug, multi);

    // File, then environment
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    // CLI overrides both
    if let Some(secs) = cli.timeout {
        config.source.timeout = secs;
    }

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::Clean(args) => cmd::clean::run(args, &config),
        Command::Config => {
            let w = &config.warehouse;
            let mut rows = vec![
                ("Feed URL", config.pipeline_config().feed_url()),
                ("Timeout", format!("{}s", config.source.timeout)),
                ("Warehouse", config.database_path().display().to_string()),
                ("Destination", format!("{}.{}", w.dataset, w.table)),
                ("Staging dataset", w.staging_dataset.clone()),
                ("Memory limit", w.memory_limit.clone()),
                (
                    "Credentials",
                    w.credentials_path
                        .clone()
                        .unwrap_or_else(|| "not set".to_string()),
                ),
                (
                    "Artifact directory",
                    config.output.artifact_dir.display().to_string(),
                ),
                (
                    "Compression level",
                    config.output.compression_level.to_string(),
                ),
                ("Cleanup markers", config.output.cleanup_markers.join(", ")),
            ];
            let from_env: Vec<&str> = config::ENV_KEYS
                .iter()
                .map(|(key, _)| *key)
                .filter(|key| std::env::var_os(key).is_some_and(|v| !v.is_empty()))
                .collect();
            if !from_env.is_empty() {
                rows.push(("From environment", from_env.join(", ")));
            }

            cmd::print_summary("Setting", &rows);
            Ok(())
        }
    }
}
