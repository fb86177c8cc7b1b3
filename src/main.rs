//! `recipegate` binary entry point.

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use recipegate::GateConfig;

#[derive(Debug, Parser)]
#[command(name = "recipegate", version, about = "Usage governance for metered recipe and assistant APIs")]
struct Cli {
    /// Config file path (default: ~/.recipegate/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: cli::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config_path = args.config.unwrap_or_else(GateConfig::default_path);
    let config = GateConfig::load(&config_path)?;

    match args.command {
        cli::Command::Serve { per_caller } => cli::cmd_serve(&config, per_caller).await,
        cli::Command::Quota { action } => cli::cmd_quota(&config, action).await,
        cli::Command::Estimate { text } => cli::cmd_estimate(&text),
    }
}
