//! Docmirror CLI - Command-line interface for Docmirror
//!
//! This is the main entry point for users interacting with Docmirror.
//! It provides commands for syncing a knowledge base into its search
//! index and for inspecting the result.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "docmirror")]
#[command(author = "Docmirror Contributors")]
#[command(version)]
#[command(about = "Keeps a full-text index in step with a directory of notes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the index with the files under ROOT
    Sync {
        /// Directory containing the category folders
        root: PathBuf,

        /// Store location (defaults to ROOT/.docmirror/store)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Re-index every file even if its content is unchanged
        #[arg(long)]
        full: bool,

        /// Follow symbolic links inside category folders
        #[arg(long)]
        follow_symlinks: bool,
    },

    /// Show how many documents are indexed per category
    Status {
        /// Directory containing the category folders
        root: PathBuf,

        /// Store location (defaults to ROOT/.docmirror/store)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that every document has exactly one search entry
    Verify {
        /// Directory containing the category folders
        root: PathBuf,

        /// Store location (defaults to ROOT/.docmirror/store)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Sync {
            root,
            db,
            full,
            follow_symlinks,
        } => commands::sync(&root, db, full, follow_symlinks),
        Commands::Status { root, db, json } => commands::status(&root, db, json),
        Commands::Verify { root, db } => commands::verify(&root, db),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
