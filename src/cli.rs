//! Command-line interface for storediff

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "storediff")]
#[command(about = "A snapshot comparison tool for versioned multi-store state databases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two snapshots and report divergent stores and keys
    Compare {
        /// Left snapshot: directory or .tar.zst archive
        left: String,

        /// Right snapshot: directory or .tar.zst archive
        right: String,

        /// Commit version to open on the left side (defaults to latest)
        #[arg(long)]
        version_left: Option<i64>,

        /// Commit version to open on the right side (defaults to latest)
        #[arg(long)]
        version_right: Option<i64>,

        /// Commit version applied to both sides
        #[arg(long, conflicts_with_all = ["version_left", "version_right"])]
        at_version: Option<i64>,

        /// Maximum divergent keys reported per store
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Keys sampled from stores present on only one side
        #[arg(long, default_value = "3")]
        samples: usize,

        /// Run the coarse positional shape diff for every differing store
        #[arg(long)]
        shape: bool,

        /// Compare stores one at a time instead of concurrently
        #[arg(long)]
        sequential: bool,

        /// Abort the comparison after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,

        /// Write the JSON report to this file as well
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show a snapshot's commit version and store root hashes
    Show {
        /// Snapshot: directory or .tar.zst archive
        source: String,

        /// Commit version to open (defaults to latest)
        #[arg(long)]
        version: Option<i64>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Pack a snapshot directory into a .tar.zst archive
    Pack {
        /// Snapshot directory to pack
        directory: PathBuf,

        /// Output archive path
        archive: PathBuf,
    },

    /// Serve comparisons over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Maximum divergent keys reported per store
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "300")]
        timeout: u64,
    },
}

/// Parse output format string
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
