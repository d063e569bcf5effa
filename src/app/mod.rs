//! Sync engine for launch_sync
//!
//! This module contains the pieces a sync run is built from: content hashing,
//! the persisted hash cache, the update service client, manifest parsing, and
//! the orchestrator that drives them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use launch_sync::app::{ClientConfig, LogObserver, NoHandoff, ServiceEndpoint, SyncOrchestrator, UpdateClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = ServiceEndpoint::new("http://localhost:3000/", "api-key", "lin")?;
//! let client = UpdateClient::new(endpoint, ClientConfig::default())?;
//!
//! let mut orchestrator = SyncOrchestrator::new(client, Arc::new(LogObserver), Arc::new(NoHandoff));
//! let report = orchestrator
//!     .run(Path::new("launcher/.sha1"), Path::new("launcher/app"))
//!     .await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod hash;
pub mod manifest;
pub mod sync;

// Re-export main public API
pub use cache::{CacheRecord, HashCache};
pub use client::{ClientConfig, ServiceEndpoint, TransferResult, UpdateClient};
pub use hash::{HashEngine, HashOutcome, Sha1Hash};
pub use manifest::{parse_manifest, ManifestEntry, ManifestHandler};
pub use sync::{
    EventLog, Handoff, LogObserver, NoHandoff, SyncEvent, SyncObserver, SyncOptions,
    SyncOrchestrator, SyncReport, SyncState,
};
