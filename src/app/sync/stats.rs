//! Per-run statistics

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a completed sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Entries in the manifest
    pub total_items: usize,
    /// Entries whose local file already matched
    pub files_matched: usize,
    /// Entries that were downloaded
    pub files_downloaded: usize,
    /// Hashes answered by the cache without reading the file
    pub cache_hits: usize,
    /// Bytes written by downloads
    pub bytes_downloaded: u64,
    /// Downloads whose byte count differed from the declared size
    pub size_mismatches: usize,
    /// Start of the run
    pub session_start: DateTime<Utc>,
    /// Wall time of the run
    pub session_duration: Duration,
    /// Whether the application was started afterwards
    pub launched: bool,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self {
            total_items: 0,
            files_matched: 0,
            files_downloaded: 0,
            cache_hits: 0,
            bytes_downloaded: 0,
            size_mismatches: 0,
            session_start: Utc::now(),
            session_duration: Duration::ZERO,
            launched: false,
        }
    }
}

impl SyncReport {
    /// Entries processed so far
    pub fn files_processed(&self) -> usize {
        self.files_matched + self.files_downloaded
    }

    /// Whether the run changed nothing on disk
    pub fn is_up_to_date(&self) -> bool {
        self.files_downloaded == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} current ({} from cache), {} downloaded ({} bytes) in {:.1}s",
            self.total_items,
            self.files_matched,
            self.cache_hits,
            self.files_downloaded,
            self.bytes_downloaded,
            self.session_duration.as_secs_f64()
        )
    }
}
