//! Persistent path → (mtime, SHA-1) table
//!
//! The cache is an optimization only. Every failure while loading, looking up,
//! storing or persisting degrades to "hash the file again" and is never
//! reported to the caller as an error.

use std::collections::HashMap;
use std::fs::Metadata;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tokio::fs;
use tracing::{debug, info, trace, warn};

use crate::app::hash::Sha1Hash;
use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

use super::format::{decode_line, encode_record, normalize_path, CacheRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedHash {
    mtime: i64,
    hash: Sha1Hash,
}

/// Hash cache owned by a single sync run
#[derive(Debug, Clone)]
pub struct HashCache {
    /// Backing file
    path: PathBuf,
    entries: HashMap<String, CachedHash>,
}

impl HashCache {
    /// An empty cache that will persist to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Load the cache stored at `path`
    ///
    /// A missing or unreadable file yields an empty cache. Lines that cannot
    /// be decoded are skipped.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::empty(path);

        let content = match fs::read_to_string(&cache.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No hash cache at {}, starting cold", cache.path.display());
                return cache;
            }
            Err(e) => {
                warn!(
                    "Could not read hash cache {}: {}, starting cold",
                    cache.path.display(),
                    e
                );
                return cache;
            }
        };

        let mut skipped = 0usize;
        for (line_no, line) in content.lines().enumerate() {
            match decode_line(line) {
                Ok(Some(record)) => {
                    cache.entries.insert(
                        record.path,
                        CachedHash {
                            mtime: record.mtime,
                            hash: record.hash,
                        },
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    trace!("Skipping hash cache line {}: {}", line_no + 1, e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(
                "Skipped {} unreadable lines in hash cache {}",
                skipped,
                cache.path.display()
            );
        }
        debug!(
            "Loaded {} hash cache entries from {}",
            cache.entries.len(),
            cache.path.display()
        );

        cache
    }

    /// Cached hash of `path`, only if its mtime still equals the recorded one
    pub async fn lookup(&self, path: &Path) -> Option<Sha1Hash> {
        let entry = self.entries.get(&normalize_path(path))?;
        let current = current_mtime(path).await?;

        if current == entry.mtime {
            Some(entry.hash)
        } else {
            trace!(
                "Stale hash cache entry for {} ({} != {})",
                path.display(),
                entry.mtime,
                current
            );
            None
        }
    }

    /// Record `hash` for `path` at the file's current mtime
    ///
    /// Silently skipped when the mtime cannot be read.
    pub async fn store(&mut self, path: &Path, hash: Sha1Hash) {
        match current_mtime(path).await {
            Some(mtime) => {
                self.entries
                    .insert(normalize_path(path), CachedHash { mtime, hash });
            }
            None => trace!("Not caching hash for {}: mtime unavailable", path.display()),
        }
    }

    /// Forget the entry for `path`
    pub fn remove(&mut self, path: &Path) -> bool {
        self.entries.remove(&normalize_path(path)).is_some()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, sorted by path
    pub fn records(&self) -> Vec<CacheRecord> {
        let mut records: Vec<CacheRecord> = self
            .entries
            .iter()
            .map(|(path, entry)| CacheRecord {
                path: path.clone(),
                mtime: entry.mtime,
                hash: entry.hash,
            })
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Write the whole table to the backing file, replacing its contents
    ///
    /// Failures are logged and otherwise ignored; the next run starts cold.
    pub async fn persist(&self) {
        match self.try_persist().await {
            Ok(()) => info!(
                "Saved {} hash cache entries to {}",
                self.entries.len(),
                self.path.display()
            ),
            Err(e) => warn!("{}: {}", e, error_source(&e)),
        }
    }

    /// Write the whole table atomically (temp file in the same directory, then rename)
    pub async fn try_persist(&self) -> CacheResult<()> {
        let mut contents = String::new();
        for record in self.records() {
            contents.push_str(&encode_record(&record));
            contents.push('\n');
        }

        let target = self.path.clone();
        let persist_error = |source: std::io::Error| CacheError::Persist {
            path: self.path.clone(),
            source,
        };

        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await.map_err(persist_error)?;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(files::HASH_CACHE_TEMP_PREFIX)
                .suffix(files::TEMP_FILE_SUFFIX)
                .tempfile_in(&parent)?;
            temp.write_all(contents.as_bytes())?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| persist_error(std::io::Error::other(e)))?
        .map_err(persist_error)
    }
}

/// Modification time of `path` in nanoseconds since the Unix epoch
async fn current_mtime(path: &Path) -> Option<i64> {
    let metadata = fs::metadata(path).await.ok()?;
    mtime_nanos(&metadata)
}

fn mtime_nanos(metadata: &Metadata) -> Option<i64> {
    let modified = metadata.modified().ok()?;
    match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).ok(),
        Err(before) => i64::try_from(before.duration().as_nanos()).ok().map(|n| -n),
    }
}

fn error_source(error: &CacheError) -> String {
    std::error::Error::source(error)
        .map(|s| s.to_string())
        .unwrap_or_default()
}
