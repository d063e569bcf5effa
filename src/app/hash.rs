//! SHA-1 digest type and the cache-accelerated hash engine
//!
//! [`Sha1Hash`] stores digests as their raw 20 bytes and renders them as
//! lowercase hex. [`HashEngine`] computes the digest of an installed file,
//! consulting a [`HashCache`] first so unchanged files are never re-read.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::app::cache::HashCache;
use crate::app::client::sink::{pump_into, HashSink, PumpError};
use crate::constants::{files, http};
use crate::errors::{CacheError, CacheResult};

/// SHA-1 digest stored as a 20-byte array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha1Hash([u8; 20]);

impl Sha1Hash {
    /// Create a SHA-1 hash from a hex string
    ///
    /// # Arguments
    ///
    /// * `hex` - 40-character hexadecimal string (case insensitive)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use launch_sync::app::Sha1Hash;
    ///
    /// let hash = Sha1Hash::from_hex("a9993e364706816aba3e25717850c26c9cd0d89d")?;
    /// let upper = Sha1Hash::from_hex("A9993E364706816ABA3E25717850C26C9CD0D89D")?;
    /// assert_eq!(hash, upper);
    /// # Ok::<(), launch_sync::errors::CacheError>(())
    /// ```
    pub fn from_hex(hex: &str) -> CacheResult<Self> {
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CacheError::InvalidHash {
                hash: hex.to_string(),
            });
        }

        let mut bytes = [0u8; 20];
        for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
            bytes[i] = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
        }

        Ok(Sha1Hash(bytes))
    }

    /// Lowercase 40-character hex representation
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(40), |mut acc, b| {
            let _ = write!(&mut acc, "{:02x}", b);
            acc
        })
    }

    /// Case-insensitive comparison against a hex string from the manifest
    ///
    /// A malformed expected value never matches.
    pub fn matches_hex(&self, expected: &str) -> bool {
        Sha1Hash::from_hex(expected.trim())
            .map(|other| other == *self)
            .unwrap_or(false)
    }

    /// Get the raw byte array representation
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Create from raw digest bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Sha1Hash(bytes)
    }

    /// Hash an in-memory buffer
    pub fn digest(data: &[u8]) -> Self {
        use sha1::{Digest, Sha1};
        Sha1Hash(Sha1::digest(data).into())
    }
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

impl fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Sha1Hash {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Sha1Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha1Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// Result of hashing one installed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashOutcome {
    /// Digest of the file, `None` when it could not be read
    pub hash: Option<Sha1Hash>,
    /// Whether the digest came from the cache without reading the file
    pub used_cache: bool,
}

impl HashOutcome {
    /// Hex digest, or an empty string when the file was unreadable
    pub fn hash_hex(&self) -> String {
        self.hash.map(|h| h.to_hex()).unwrap_or_default()
    }

    /// Whether the local file is already the expected content
    pub fn matches(&self, expected_hex: &str) -> bool {
        self.hash.map_or(false, |h| h.matches_hex(expected_hex))
    }
}

/// Streaming SHA-1 hasher for installed files
#[derive(Debug, Clone)]
pub struct HashEngine {
    chunk_timeout: Duration,
    read_chunk_size: usize,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new(http::CHUNK_TIMEOUT)
    }
}

impl HashEngine {
    /// Create an engine that gives up on a read stalled longer than `chunk_timeout`
    pub fn new(chunk_timeout: Duration) -> Self {
        Self {
            chunk_timeout,
            read_chunk_size: files::HASH_READ_CHUNK_SIZE,
        }
    }

    /// Hash `path`, using and refreshing `cache`
    ///
    /// A cache hit returns without touching the file contents. On a miss the
    /// file is streamed through SHA-1 and the result is stored in the in-memory
    /// cache. A file that cannot be read yields `hash: None`, which callers
    /// treat as "needs download".
    pub async fn hash(&self, path: &Path, cache: &mut HashCache) -> HashOutcome {
        if let Some(hash) = cache.lookup(path).await {
            trace!("Hash cache hit for {}", path.display());
            return HashOutcome {
                hash: Some(hash),
                used_cache: true,
            };
        }

        match self.compute(path).await {
            Ok(hash) => {
                cache.store(path, hash).await;
                HashOutcome {
                    hash: Some(hash),
                    used_cache: false,
                }
            }
            Err(e) => {
                debug!("{} ({:?})", e, e.kind());
                HashOutcome {
                    hash: None,
                    used_cache: false,
                }
            }
        }
    }

    /// Compute the SHA-1 of a file without consulting any cache
    pub async fn compute(&self, path: &Path) -> CacheResult<Sha1Hash> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| CacheError::LocalRead {
                path: path.to_path_buf(),
                source,
            })?;

        let stream = ReaderStream::with_capacity(file, self.read_chunk_size);
        let mut sink = HashSink::new();

        match pump_into(stream, &mut sink, self.chunk_timeout, |_| {}).await {
            Ok(bytes) => {
                let hash = sink.finalize();
                debug!("Hashed {} ({} bytes): {}", path.display(), bytes, hash);
                Ok(hash)
            }
            Err(PumpError::Timeout) => Err(CacheError::LocalReadTimeout {
                path: path.to_path_buf(),
            }),
            Err(PumpError::Source(source)) | Err(PumpError::Sink(source)) => {
                Err(CacheError::LocalRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn test_valid_hex_strings() {
        let hash = Sha1Hash::from_hex(ABC_SHA1).unwrap();
        assert_eq!(hash.to_hex(), ABC_SHA1);
        assert_eq!(format!("{}", hash), ABC_SHA1);

        let upper: Sha1Hash = ABC_SHA1.to_uppercase().parse().unwrap();
        assert_eq!(hash, upper);
    }

    #[test]
    fn test_invalid_hex_strings() {
        let invalid_cases = [
            "",
            "a9993e364706816aba3e25717850c26c9cd0d89",
            "a9993e364706816aba3e25717850c26c9cd0d89d0",
            "g9993e364706816aba3e25717850c26c9cd0d89d",
            "a9993e36 706816aba3e25717850c26c9cd0d89d",
        ];

        for hex in &invalid_cases {
            assert!(Sha1Hash::from_hex(hex).is_err(), "Should reject: {}", hex);
        }
    }

    #[test]
    fn test_digest_known_vectors() {
        assert_eq!(Sha1Hash::digest(b"abc").to_hex(), ABC_SHA1);
        assert_eq!(Sha1Hash::digest(b"").to_hex(), EMPTY_SHA1);
    }

    #[test]
    fn test_matches_hex() {
        let hash = Sha1Hash::digest(b"abc");
        assert!(hash.matches_hex(ABC_SHA1));
        assert!(hash.matches_hex(&ABC_SHA1.to_uppercase()));
        assert!(!hash.matches_hex(EMPTY_SHA1));
        assert!(!hash.matches_hex("not-a-hash"));
        assert!(!hash.matches_hex(""));
    }

    #[test]
    fn test_serialization() {
        let hash = Sha1Hash::digest(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", ABC_SHA1));
        let back: Sha1Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[tokio::test]
    async fn test_compute_streams_large_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("large.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &content).await.unwrap();

        let engine = HashEngine::default();
        let hash = engine.compute(&path).await.unwrap();
        assert_eq!(hash, Sha1Hash::digest(&content));
    }

    #[tokio::test]
    async fn test_hash_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = HashCache::empty(temp_dir.path().join(".sha1"));
        let engine = HashEngine::default();

        let outcome = engine.hash(&temp_dir.path().join("absent"), &mut cache).await;
        assert_eq!(outcome.hash, None);
        assert_eq!(outcome.hash_hex(), "");
        assert!(!outcome.used_cache);
        assert!(!outcome.matches(EMPTY_SHA1));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_hash_uses_cache_on_second_call() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let mut cache = HashCache::empty(temp_dir.path().join(".sha1"));
        let engine = HashEngine::default();

        let first = engine.hash(&path, &mut cache).await;
        assert!(!first.used_cache);
        assert!(first.matches(ABC_SHA1));

        let second = engine.hash(&path, &mut cache).await;
        assert!(second.used_cache);
        assert_eq!(second.hash, first.hash);
    }

    #[tokio::test]
    async fn test_cached_hash_is_trusted_while_mtime_is_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let mut cache = HashCache::empty(temp_dir.path().join(".sha1"));
        let bogus = Sha1Hash::digest(b"something else");
        cache.store(&path, bogus).await;

        // The cache is authoritative for an unchanged mtime: the file is not re-read.
        let outcome = HashEngine::default().hash(&path, &mut cache).await;
        assert!(outcome.used_cache);
        assert_eq!(outcome.hash, Some(bogus));
    }
}
