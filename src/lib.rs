//! launch_sync Library
//!
//! Self-updating application launcher. A sync run compares every file an
//! update service lists against the local application folder by SHA-1,
//! downloads only what differs, and then starts the application.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod launcher;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
