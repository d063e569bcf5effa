//! Sync orchestration
//!
//! A sync run fetches the manifest once, then walks it strictly in order: for
//! each entry the installed file is hashed (through the hash cache) and either
//! accepted as current or downloaded over. The run ends by saving the hash
//! cache and handing off to the application, or stops at the first failure.
//!
//! The run is an explicit state machine ([`SyncState`]) advanced by a single
//! loop. Each step awaits its I/O to completion before the next state is
//! chosen, so entry `i + 1` is never started before entry `i` has finished.
//!
//! - [`events`] - notification vocabulary and observers
//! - [`handoff`] - starting the application after a run
//! - [`signals`] - Ctrl-C / SIGTERM to cooperative cancellation
//! - [`stats`] - [`SyncReport`]

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::cache::HashCache;
use crate::app::client::{TransferResult, UpdateClient};
use crate::app::hash::HashEngine;
use crate::app::manifest::ManifestEntry;
use crate::errors::{DownloadError, SyncError, SyncResult};

pub mod events;
pub mod handoff;
pub mod signals;
pub mod stats;

#[cfg(test)]
mod tests;

pub use events::{EventLog, LogObserver, SyncEvent, SyncObserver};
pub use handoff::{Handoff, NoHandoff};
pub use signals::{create_shutdown_token, SignalHandler};
pub use stats::SyncReport;

/// Behaviour switches for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Treat a byte count that differs from the declared size as a failure
    pub strict_size: bool,
    /// Hand off to the application after a complete run
    pub launch: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            strict_size: false,
            launch: true,
        }
    }
}

/// Position of a run
#[derive(Debug)]
pub enum SyncState {
    FetchingManifest,
    /// Next entry to process, 0-based
    Idle(usize),
    Hashing { index: usize, destination: PathBuf },
    Matched { index: usize, hash: String },
    Downloading { index: usize, destination: PathBuf },
    Finalizing,
    Done,
    /// Cancelled between entries; saves the cache, no hand-off
    Stopping,
    /// Failure; the cache file is left untouched
    ErrorStop(SyncError),
}

/// Drives one sync run at a time
pub struct SyncOrchestrator {
    client: UpdateClient,
    hasher: HashEngine,
    observer: Arc<dyn SyncObserver>,
    handoff: Arc<dyn Handoff>,
    options: SyncOptions,
    shutdown: Option<CancellationToken>,
}

impl SyncOrchestrator {
    /// Create an orchestrator reporting to `observer` and starting the
    /// application through `handoff`
    pub fn new(
        client: UpdateClient,
        observer: Arc<dyn SyncObserver>,
        handoff: Arc<dyn Handoff>,
    ) -> Self {
        let hasher = HashEngine::new(client.config().chunk_timeout);
        Self {
            client,
            hasher,
            observer,
            handoff,
            options: SyncOptions::default(),
            shutdown: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop between entries once `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run one sync of `install_root` using the hash cache stored at `cache_path`
    ///
    /// Emits [`SyncEvent`]s as it goes. On failure the last event is
    /// [`SyncEvent::Error`] and the cache file is left as it was.
    ///
    /// Cancellation is checked before the manifest fetch and before each
    /// entry. It is a graceful stop, not a failure: the hashes computed so far
    /// are saved, an error event of kind `Cancelled` is emitted and
    /// [`SyncError::Cancelled`] is returned.
    pub async fn run(
        &mut self,
        cache_path: &Path,
        install_root: &Path,
    ) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();
        let mut cache = HashCache::load(cache_path).await;
        let mut manifest: Vec<ManifestEntry> = Vec::new();
        let mut state = SyncState::FetchingManifest;

        info!(
            "Starting sync of {} ({} cached hashes)",
            install_root.display(),
            cache.len()
        );

        loop {
            debug!("Sync state: {:?}", state);
            state = match state {
                SyncState::FetchingManifest if self.cancel_requested() => {
                    warn!("Sync cancelled before fetching the manifest");
                    SyncState::Stopping
                }

                SyncState::FetchingManifest => match self.client.fetch_manifest().await {
                    Ok(entries) => {
                        manifest = entries;
                        report.total_items = manifest.len();
                        self.observer.notify(SyncEvent::SetTotalItems(manifest.len()));
                        SyncState::Idle(0)
                    }
                    Err(e) => SyncState::ErrorStop(e.into()),
                },

                SyncState::Idle(index) if self.cancel_requested() => {
                    warn!("Sync cancelled after {} of {} entries", index, manifest.len());
                    SyncState::Stopping
                }

                SyncState::Idle(index) if index >= manifest.len() => SyncState::Finalizing,

                SyncState::Idle(index) => {
                    match resolve_destination(install_root, &manifest[index].name) {
                        Ok(destination) => SyncState::Hashing { index, destination },
                        Err(e) => SyncState::ErrorStop(e),
                    }
                }

                SyncState::Hashing { index, destination } => {
                    let entry = &manifest[index];
                    let outcome = self.hasher.hash(&destination, &mut cache).await;
                    if outcome.used_cache {
                        report.cache_hits += 1;
                    }

                    if outcome.matches(&entry.expected_hash) {
                        SyncState::Matched {
                            index,
                            hash: outcome.hash_hex(),
                        }
                    } else {
                        debug!(
                            "{}: local '{}' != expected '{}'",
                            entry.name,
                            outcome.hash_hex(),
                            entry.expected_hash
                        );
                        SyncState::Downloading { index, destination }
                    }
                }

                SyncState::Matched { index, hash } => {
                    let entry = &manifest[index];
                    info!("[{}/{}] {} is current", index + 1, manifest.len(), entry.name);
                    report.files_matched += 1;
                    self.observer.notify(SyncEvent::SameHash {
                        index: index + 1,
                        name: entry.name.clone(),
                        hash,
                    });
                    SyncState::Idle(index + 1)
                }

                SyncState::Downloading { index, destination } => {
                    match self.download(&manifest[index], index, &destination).await {
                        Ok(transfer) => {
                            // Hashed while streaming; recorded against the new mtime
                            cache.store(&destination, transfer.hash).await;
                            report.files_downloaded += 1;
                            report.bytes_downloaded += transfer.bytes;
                            if transfer.bytes != manifest[index].expected_size {
                                report.size_mismatches += 1;
                            }
                            SyncState::Idle(index + 1)
                        }
                        Err(e) => SyncState::ErrorStop(e),
                    }
                }

                SyncState::Finalizing => {
                    cache.persist().await;
                    report.session_duration = started.elapsed();
                    self.observer.notify(SyncEvent::Completed);
                    info!("Sync completed: {}", report);

                    if self.options.launch {
                        match self.handoff.hand_off() {
                            Ok(()) => {
                                report.launched = true;
                                self.observer.notify(SyncEvent::Exit);
                                SyncState::Done
                            }
                            Err(e) => SyncState::ErrorStop(e.into()),
                        }
                    } else {
                        SyncState::Done
                    }
                }

                SyncState::Done => return Ok(report),

                SyncState::Stopping => {
                    cache.persist().await;
                    let e = SyncError::Cancelled;
                    info!("Sync stopped: {}", e);
                    self.observer.notify(SyncEvent::Error {
                        message: e.user_message(),
                        kind: e.kind(),
                        previous_install: self.handoff.installed(),
                    });
                    return Err(e);
                }

                SyncState::ErrorStop(e) => {
                    error!("Sync stopped: {}", e);
                    self.observer.notify(SyncEvent::Error {
                        message: e.user_message(),
                        kind: e.kind(),
                        previous_install: self.handoff.installed(),
                    });
                    return Err(e);
                }
            };
        }
    }

    /// Download one entry over its destination
    async fn download(
        &self,
        entry: &ManifestEntry,
        index: usize,
        destination: &Path,
    ) -> SyncResult<TransferResult> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SyncError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let position = index + 1;
        info!("[{}] Downloading {}", position, entry.name);
        self.observer.notify(SyncEvent::StartDownload {
            index: position,
            name: entry.name.clone(),
        });

        let observer = Arc::clone(&self.observer);
        let expected = entry.expected_size;
        let transfer = self
            .client
            .download_file(&entry.name, destination, |bytes| {
                observer.notify(SyncEvent::DownloadProgress {
                    index: position,
                    bytes,
                    expected,
                })
            })
            .await?;
        let bytes = transfer.bytes;

        if bytes != expected {
            if self.options.strict_size {
                return Err(DownloadError::SizeMismatch {
                    item: entry.name.clone(),
                    expected,
                    actual: bytes,
                }
                .into());
            }
            warn!(
                "{}: received {} bytes, manifest declares {}",
                entry.name, bytes, expected
            );
        }

        self.observer.notify(SyncEvent::FileDownloaded {
            index: position,
            name: entry.name.clone(),
            bytes,
        });
        Ok(transfer)
    }

    fn cancel_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

/// Destination of manifest item `name` under `install_root`
///
/// Only plain relative names are accepted; anything that could resolve
/// outside the install root is rejected. `.` segments are dropped so that
/// one file always maps to one path (and one hash cache key).
pub fn resolve_destination(install_root: &Path, name: &str) -> SyncResult<PathBuf> {
    let mut destination = install_root.to_path_buf();
    let mut normal = 0usize;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                destination.push(part);
                normal += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SyncError::UnsafePath {
                    name: name.to_string(),
                })
            }
        }
    }

    if normal == 0 {
        return Err(SyncError::UnsafePath {
            name: name.to_string(),
        });
    }

    Ok(destination)
}
