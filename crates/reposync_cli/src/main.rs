//! reposync CLI
//!
//! Keeps one git branch in sync across machines through encrypted links in
//! a shared blob store.
//!
//! # Commands
//!
//! - `push` - Upload local commits as the next chain link
//! - `pull` - Apply new links and rebase local work on top
//! - `status` - Show local state and the canonical chain
//! - `release-lease` - Clear a lease left behind by an interrupted run

mod commands;

use clap::{Parser, Subcommand};
use commands::{Options, SyncArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Encrypted, store-agnostic git branch sync.
#[derive(Parser)]
#[command(name = "reposync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload local commits as the next chain link
    Push(SyncArgs),

    /// Apply new links and rebase local work on top
    Pull(SyncArgs),

    /// Show local state and the canonical chain
    Status {
        /// Repository path
        repo: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        #[command(flatten)]
        options: Options,
    },

    /// Clear a lease left behind by an interrupted run
    ReleaseLease {
        /// Repository path
        repo: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Push(args) => commands::push::run(&args),
        Commands::Pull(args) => commands::pull::run(&args),
        Commands::Status {
            repo,
            format,
            options,
        } => commands::status::run(&repo, &options, &format),
        Commands::ReleaseLease { repo } => commands::release_lease::run(&repo),
    }
}
