//! CLI command definitions and dispatch.

pub mod squash;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use strata_core::{Result, StrataError};

/// Squash container image layers.
#[derive(Parser)]
#[command(name = "strata", version, about)]
pub struct Cli {
    /// Enable experimental commands
    #[arg(long, global = true, env = "STRATA_EXPERIMENTAL")]
    pub experimental: bool,

    /// Data root directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Squash the trailing layers of an image into one layer
    Squash(squash::SquashArgs),
}

/// Dispatch a parsed CLI invocation.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let root = cli
        .root
        .or_else(|| dirs::data_local_dir().map(|d| d.join("strata")))
        .ok_or_else(|| StrataError::Other("could not determine a data root directory".to_string()))?;

    match cli.command {
        Command::Squash(args) => squash::execute(args, &root, cli.experimental).await,
    }
}
