//! Notifications emitted to the embedding front end
//!
//! The front end is handed to the orchestrator as a [`SyncObserver`]; nothing
//! is looked up through global state. Indices carried by per-file events are
//! 1-based, matching what a user sees ("file 2 of 5").

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::errors::ErrorKind;

/// Notification vocabulary of a sync run and of the launcher around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Window title
    SetTitle(String),
    /// Header line shown above the progress display
    SetHeaderText(String),
    /// Terms text awaiting acceptance
    ShowEula(String),
    /// Number of manifest entries about to be processed
    SetTotalItems(usize),
    /// The local file already has the expected content
    SameHash {
        index: usize,
        name: String,
        hash: String,
    },
    /// A download is about to start
    StartDownload { index: usize, name: String },
    /// Cumulative bytes received for the current download
    DownloadProgress {
        index: usize,
        bytes: u64,
        /// Declared size from the manifest; advisory only
        expected: u64,
    },
    /// A download finished
    FileDownloaded {
        index: usize,
        name: String,
        bytes: u64,
    },
    /// The run stopped; always the last event of a failed run
    Error {
        message: String,
        kind: ErrorKind,
        /// Whether an earlier installation can still be started
        previous_install: bool,
    },
    /// Every entry is current and the hash cache has been saved
    Completed,
    /// The host should close the launcher
    Exit,
}

/// Receiver of [`SyncEvent`]s
///
/// Called inline from the orchestrator, so implementations should return
/// quickly (forward to a channel or redraw a progress bar).
pub trait SyncObserver: Send + Sync {
    fn notify(&self, event: SyncEvent);
}

/// Forwards events to an async consumer
impl SyncObserver for mpsc::UnboundedSender<SyncEvent> {
    fn notify(&self, event: SyncEvent) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

/// Records every event in order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<SyncEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<SyncEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events other than download progress, which is timing dependent
    pub fn milestones(&self) -> Vec<SyncEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, SyncEvent::DownloadProgress { .. }))
            .collect()
    }
}

impl SyncObserver for EventLog {
    fn notify(&self, event: SyncEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes events to the tracing log; used when no front end is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SyncObserver for LogObserver {
    fn notify(&self, event: SyncEvent) {
        match event {
            SyncEvent::SetTotalItems(total) => info!("{} files in manifest", total),
            SyncEvent::SameHash { index, name, .. } => debug!("[{}] {} is current", index, name),
            SyncEvent::StartDownload { index, name } => info!("[{}] Downloading {}", index, name),
            SyncEvent::DownloadProgress {
                index,
                bytes,
                expected,
            } => trace!("[{}] {}/{} bytes", index, bytes, expected),
            SyncEvent::FileDownloaded { index, name, bytes } => {
                info!("[{}] Downloaded {} ({} bytes)", index, name, bytes)
            }
            SyncEvent::Error { message, .. } => warn!("{}", message),
            SyncEvent::Completed => info!("Update completed"),
            other => debug!("{:?}", other),
        }
    }
}
