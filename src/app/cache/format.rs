//! On-disk record format of the hash cache
//!
//! One record per line. Current records are JSON objects
//! (`{"path":…,"mtime":…,"hash":…}`) so paths may contain whitespace; the
//! older whitespace-separated `<path> <mtime> <hash>` layout is still read.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::hash::Sha1Hash;
use crate::errors::{CacheError, CacheResult};

/// One persisted cache record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Normalized file path (forward slashes)
    pub path: String,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime: i64,
    /// Content digest at that modification time
    pub hash: Sha1Hash,
}

/// Decode one line
///
/// Blank lines yield `Ok(None)`.
pub fn decode_line(line: &str) -> CacheResult<Option<CacheRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(Some)
            .map_err(|e| CacheError::MalformedRecord {
                reason: e.to_string(),
            });
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [path, mtime, hash] = tokens[..] else {
        return Err(CacheError::MalformedRecord {
            reason: format!("expected 3 fields, found {}", tokens.len()),
        });
    };

    let mtime = mtime.parse::<i64>().map_err(|e| CacheError::MalformedRecord {
        reason: format!("bad timestamp '{}': {}", mtime, e),
    })?;

    Ok(Some(CacheRecord {
        path: path.to_string(),
        mtime,
        hash: Sha1Hash::from_hex(hash)?,
    }))
}

/// Encode one record as a single JSON line, without the trailing newline
pub fn encode_record(record: &CacheRecord) -> String {
    // Serializing a struct of a string, an integer and a hex string cannot fail.
    serde_json::to_string(record).unwrap_or_default()
}

/// Cache key for a filesystem path
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
