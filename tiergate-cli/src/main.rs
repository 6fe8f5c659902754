//! Tiergate operator CLI.
//!
//! Usage:
//!   tiergate modules
//!   tiergate tier set 42 gold --expires 2025-01-01T00:00:00Z --limit exports=50
//!   tiergate check 42 episodes
//!   tiergate sweep
//!
//! Reads `tiergate.toml` from the working directory unless `--config` says
//! otherwise.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tiergate_cli::{run, App, CliConfig, Command, DEFAULT_CONFIG_FILE};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tiergate")]
#[command(about = "Manage Tiergate memberships, quotas and feature modules")]
struct Args {
    /// Path to the CLI config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load(&args.config)?;
    debug!(?config, "Loaded config");

    let app = App::open(&config)?;
    print!("{}", run(&app, args.command)?);
    Ok(())
}
