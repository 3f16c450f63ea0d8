//! Command-line interface components
//!
//! This module contains CLI-specific code for Listing Watch: argument
//! parsing and the handlers behind each subcommand.

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, LedgerAction, LedgerArgs, RunArgs,
};
pub use commands::{apply_run_overrides, handle_config, handle_ledger, handle_run};
