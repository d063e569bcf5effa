//! Prelude module for launch_sync
//!
//! Re-exports what an embedder typically needs, so a single
//! `use launch_sync::prelude::*;` covers building a client, running a sync
//! and observing it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use launch_sync::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let layout = InstallLayout::from_root("launcher", "app");
//!     let endpoint = ServiceEndpoint::new("http://localhost:3000/", "api-key", OS_KEY)
//!         .map_err(|e| AppError::generic(e.to_string()))?;
//!     let client = UpdateClient::new(endpoint, ClientConfig::default())?;
//!     let handoff = Arc::new(ProcessHandoff::new(&layout, vec!["launcher".to_string()]));
//!
//!     let session = LauncherSession::new(layout, client, Arc::new(LogObserver), handoff);
//!     session.on_started().await?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, ErrorKind, Result};

// Engine components
pub use crate::app::{
    ClientConfig, HashCache, HashEngine, ManifestEntry, ServiceEndpoint, Sha1Hash,
    UpdateClient,
    // Orchestration and observation
    EventLog, Handoff, LogObserver, NoHandoff, SyncEvent, SyncObserver, SyncOptions,
    SyncOrchestrator, SyncReport,
};

// Launcher around the engine
pub use crate::config::AppConfig;
pub use crate::launcher::{InstallLayout, InstallMode, LauncherSession, ProcessHandoff, StartOutcome};

// Commonly used constants
pub use crate::constants::{EULA_ITEM, HASH_CACHE_FILE, OS_KEY, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
