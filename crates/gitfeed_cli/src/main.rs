//! gitfeed CLI
//!
//! Inspection and producer maintenance over a JSON configuration file.
//!
//! # Commands
//!
//! - `changes` - Print the classified changes between two versions
//! - `status` - Print uncommitted producer changes
//! - `commit` - Commit pending producer changes and push
//! - `push` - Force-push the producer branch
//! - `rollback` - Undo the last producer commit
//! - `update` - Advance a consumer to the latest version
//! - `history` - List recent commits

mod commands;

use clap::{Parser, Subcommand};
use commands::Context;
use gitfeed_sync::SyncError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for lock contention (`EX_TEMPFAIL`).
const EXIT_LOCKED: u8 = 75;

/// gitfeed change-feed tools.
#[derive(Parser)]
#[command(name = "gitfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(global = true, short, long, default_value = "gitfeed.json")]
    config: PathBuf,

    /// File holding the consumer's version pointer
    /// (defaults to `<repo_path>.version`)
    #[arg(global = true, long)]
    state: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the classified changes between two versions as JSON
    Changes {
        /// Version to diff from
        from: String,
        /// Version to diff to
        to: String,
    },

    /// Print uncommitted producer changes as JSON
    Status,

    /// Commit pending producer changes and push
    Commit {
        /// Commit message
        #[arg(short, long, default_value = gitfeed_sync::DEFAULT_COMMIT_MESSAGE)]
        message: String,

        /// Commit only these records, as `Category=id1,id2` (repeatable)
        #[arg(long)]
        only: Vec<String>,
    },

    /// Force-push the producer branch to the push URL
    Push,

    /// Undo the last producer commit and push
    Rollback,

    /// Advance a consumer to the latest version
    Update,

    /// List recent commits, newest first
    History {
        /// Maximum number of commits
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e
                .downcast_ref::<SyncError>()
                .is_some_and(SyncError::is_lock_contention)
            {
                ExitCode::from(EXIT_LOCKED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::load(&cli.config, cli.state)?;

    match cli.command {
        Commands::Changes { from, to } => commands::changes::run(&context, &from, &to)?,
        Commands::Status => commands::status::run(&context)?,
        Commands::Commit { message, only } => commands::commit::run(&context, &message, &only)?,
        Commands::Push => commands::commit::push(&context)?,
        Commands::Rollback => commands::rollback::run(&context)?,
        Commands::Update => commands::update::run(&context)?,
        Commands::History { limit } => commands::history::run(&context, limit)?,
    }

    Ok(())
}
