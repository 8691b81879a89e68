use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod replay;

use config::Config;

#[derive(Parser)]
#[command(name = "presence", version, about = "Liveness verdicts from face detection traces")]
struct Cli {
    /// TOML file with liveness tunables (overrides PRESENCE_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `presence_core=trace` (defaults to RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines detection trace through the liveness engine.
    Replay {
        /// Trace files, or `-` for stdin. Each one is replayed as a fresh session.
        #[arg(required = true)]
        traces: Vec<PathBuf>,

        /// Emit one JSON report per tick instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective liveness configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level filter")?,
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(source = ?config.source, tick_queue = config.tick_queue, "configuration loaded");

    match cli.command {
        Command::Replay { traces, json } => {
            let engine = engine::spawn_engine(config.liveness, config.tick_queue)?;
            replay::run(&engine, &traces, json).await?;
        }
        Command::Config => {
            let text = toml::to_string_pretty(&config.liveness)
                .context("failed to serialize configuration")?;
            print!("{text}");
        }
    }

    Ok(())
}
