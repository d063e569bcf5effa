//! Command-line argument parsing for launch_sync
//!
//! This module defines the CLI structure using clap derive macros: the full
//! launcher flow, sync-only runs, starting the installed application, and
//! inspection of the terms marker and hash cache.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

/// launch_sync - keep an application folder in step with its update service
#[derive(Parser, Debug)]
#[command(
    name = "launch_sync",
    version,
    about = "Self-updating application launcher",
    long_about = "Brings a local application folder up to date with an update service, \
downloading only files whose content changed, then starts the application."
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
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Install root (overrides install.mode)
    #[arg(long, global = true, value_name = "DIR")]
    pub install_root: Option<PathBuf>,

    /// Update service base URL
    #[arg(long, global = true, value_name = "URL")]
    pub service_url: Option<String>,

    /// Platform key sent to the service
    #[arg(long, global = true, value_name = "KEY")]
    pub os_key: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the terms if needed, update, then start the application
    Run(RunArgs),

    /// Update the application folder without starting anything
    Sync,

    /// Start the installed application as it is
    Launch,

    /// Manage the terms acceptance marker
    Eula(EulaArgs),

    /// Inspect or drop the hash cache
    Cache(CacheArgs),

    /// Show the resolved install layout and configuration source
    Status,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Accept the terms without prompting
    #[arg(long)]
    pub accept_eula: bool,

    /// Do not start the application after updating
    #[arg(long)]
    pub no_launch: bool,
}

/// Arguments for terms management
#[derive(Args, Debug)]
pub struct EulaArgs {
    #[command(subcommand)]
    pub action: EulaAction,
}

/// Terms actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulaAction {
    /// Record acceptance of the terms
    Accept,

    /// Show whether the terms have been accepted
    Status,

    /// Forget the acceptance so the terms are shown again
    Reset,
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// List cached hashes
    Show {
        /// Show at most this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete the cache file; every file is rehashed on the next sync
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level for the crate's own targets
    ///
    /// Verbosity flags win over the configured level.
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_string()
        }
    }

    /// Configuration values given as flags
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            service_url: self.global.service_url.clone(),
            os_key: self.global.os_key.clone(),
            install_root: self.global.install_root.clone(),
        }
    }
}
