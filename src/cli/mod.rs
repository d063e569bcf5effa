//! Command-line interface components
//!
//! Argument parsing, command handlers, and the terminal progress observer
//! for the launch_sync binary.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{CacheAction, CacheArgs, Cli, Commands, EulaAction, EulaArgs, GlobalArgs, RunArgs};
pub use commands::{
    handle_cache, handle_eula, handle_launch, handle_run, handle_status, handle_sync,
    CommandContext,
};
pub use progress::{describe_event, ProgressConfig, ProgressDisplay};
