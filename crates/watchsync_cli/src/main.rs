//! watchsync CLI
//!
//! Command-line tools for inspecting and syncing watchsync store documents.
//!
//! # Commands
//!
//! - `inspect` - Count records, tombstones and malformed items in a store
//! - `merge` - Merge two store documents offline and report what happened
//! - `chunk` - Show how a store would be split into remote write batches
//! - `sync` - Run a full sync between a local and a remote document

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// watchsync command-line tools.
#[derive(Parser)]
#[command(name = "watchsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count the items held by a store document
    Inspect {
        /// Path to the store document
        path: PathBuf,

        /// Treat the document as a remote store with this key prefix
        #[arg(short, long)]
        namespace: Option<String>,

        /// List malformed items
        #[arg(short, long)]
        malformed: bool,
    },

    /// Merge a local and a remote document
    Merge {
        /// Local store document
        #[arg(long)]
        local: PathBuf,

        /// Remote store document
        #[arg(long)]
        remote: PathBuf,

        /// Merge time in epoch milliseconds (defaults to now)
        #[arg(long)]
        now: Option<u64>,

        /// Last sync time in epoch milliseconds (defaults to the local settings)
        #[arg(long)]
        last_sync: Option<u64>,

        /// Write the merged local document here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the remote write batches for a document
    Chunk {
        /// Path to the store document
        path: PathBuf,

        /// Maximum bytes per batch
        #[arg(short, long, default_value = "8000")]
        max_bytes: usize,
    },

    /// Run a full sync between two documents
    Sync {
        /// Local store document
        #[arg(long)]
        local: PathBuf,

        /// Remote store document
        #[arg(long)]
        remote: PathBuf,

        /// Switch sync off instead
        #[arg(short, long)]
        disable: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect {
            path,
            namespace,
            malformed,
        } => {
            commands::inspect::run(&path, namespace.as_deref(), malformed, &cli.format)?;
        }
        Commands::Merge {
            local,
            remote,
            now,
            last_sync,
            out,
        } => {
            commands::merge::run(&local, &remote, now, last_sync, out.as_deref(), &cli.format)?;
        }
        Commands::Chunk { path, max_bytes } => {
            commands::chunk::run(&path, max_bytes, &cli.format)?;
        }
        Commands::Sync {
            local,
            remote,
            disable,
        } => {
            commands::sync::run(&local, &remote, disable, &cli.format)?;
        }
        Commands::Version => {
            println!("watchsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("watchsync engine v{}", watchsync_engine::VERSION);
        }
    }

    Ok(())
}
