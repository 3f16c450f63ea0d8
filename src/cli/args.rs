//! Command-line argument parsing for Listing Watch
//!
//! This module defines the CLI structure using clap derive macros: running
//! the dispatcher, managing the configuration file, and inspecting the
//! persisted ledger.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Listing Watch - get notified about new marketplace listings
#[derive(Parser, Debug)]
#[command(
    name = "listing_watch",
    version,
    about = "Watch marketplace queries and push new listings to subscribers",
    long_about = "Polls configured marketplace queries, remembers which listings were already seen,
and pushes every new one to WebSocket subscribers and, optionally, a Telegram chat."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispatcher until interrupted
    Run(RunArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Inspect or compact the persisted ledger
    Ledger(LedgerArgs),
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Port for the WebSocket subscription endpoint
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface for the WebSocket subscription endpoint
    #[arg(long)]
    pub host: Option<String>,

    /// Do not serve the subscription endpoint
    #[arg(long)]
    pub no_server: bool,

    /// Persist the ledger to this file
    #[arg(long, value_name = "PATH")]
    pub ledger_file: Option<PathBuf>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Check the configuration without starting anything
    Validate,
}

/// Arguments for ledger management
#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub action: LedgerAction,
}

/// Ledger actions
#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Show size and entry count of the ledger file
    Stats {
        /// Ledger file (defaults to the configured one)
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Halve the ledger file if it exceeds the compaction threshold
    Compact {
        /// Ledger file (defaults to the configured one)
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested on the command line, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl RunArgs {
    /// Check flag combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.no_server && (self.port.is_some() || self.host.is_some()) {
            return Err("--no-server cannot be combined with --port or --host".to_string());
        }
        if self.port == Some(0) {
            return Err("Port must be greater than 0".to_string());
        }
        Ok(())
    }
}
