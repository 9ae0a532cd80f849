//! CLI command definitions and dispatch.

mod meta;
mod stat;
mod version;

use clap::{Parser, Subcommand};

pub use stat::history_table;

/// ocibundle — inspect OCI images and the bundles unpacked from them.
#[derive(Parser)]
#[command(name = "ocibundle", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Show image history aligned with its layers
    Stat(stat::StatArgs),
    /// Inspect or initialise bundle metadata
    Meta(meta::MetaArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Stat(args) => stat::execute(args).await,
        Command::Meta(args) => meta::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
