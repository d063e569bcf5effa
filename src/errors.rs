//! Error types for launch_sync
//!
//! This module defines the error types for every component of the launcher.
//! Errors are designed to be actionable and to carry enough context to render a
//! display-ready message for the observing front end.

use std::path::PathBuf;
use thiserror::Error;

use crate::constants::messages;

/// Manifest retrieval errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The service answered 404 (unknown key or platform)
    #[error("Page not found (404). {body}")]
    NotFound { body: String },

    /// The service answered with a non-success status other than 404
    #[error("Server unreachable (HTTP status: {status})")]
    ServerError { status: u16 },

    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("Server unreachable ({0})")]
    Http(#[from] reqwest::Error),

    /// The response body stalled
    #[error("Server unreachable (no data received for {seconds} seconds)")]
    Timeout { seconds: u64 },

    /// The response body is not a JSON array
    #[error("Invalid manifest format: {reason}")]
    InvalidFormat { reason: String },

    /// The service URL could not be turned into an endpoint URL
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Single-item download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The service answered 404 for this item
    #[error("Page not found (404). {status_text}")]
    NotFound { status_text: String },

    /// The service answered with a non-success status other than 404
    #[error("Server unreachable (HTTP status: {status})")]
    ServerError { status: u16 },

    /// Transport-level failure while sending the request or reading the body
    #[error("Server unreachable ({0})")]
    Http(#[from] reqwest::Error),

    /// No body chunk arrived within the configured idle timeout
    #[error("Server unreachable (no data received for {seconds} seconds)")]
    Timeout { seconds: u64 },

    /// The destination could not be opened or written
    #[error("{} {}", messages::SAVE_FAILED, path.display())]
    FilePermission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Received byte count differs from the manifest's declared size
    #[error("File size mismatch for {item}. Expected: {expected} bytes, got: {actual} bytes")]
    SizeMismatch {
        item: String,
        expected: u64,
        actual: u64,
    },

    /// The service URL could not be turned into an endpoint URL
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Hash cache and local hashing errors
///
/// These never abort a sync run: the cache is an optimization and local read
/// failures are folded into "needs download".
#[derive(Error, Debug)]
pub enum CacheError {
    /// The candidate file could not be opened or read
    #[error("Failed to read {path} for hashing")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the candidate file stalled
    #[error("Timed out reading {path} for hashing")]
    LocalReadTimeout { path: PathBuf },

    /// The cache file could not be written
    #[error("Failed to persist hash cache to {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be decoded
    #[error("Malformed hash cache record: {reason}")]
    MalformedRecord { reason: String },

    /// A hex digest had the wrong length or characters
    #[error("Invalid hash format: {hash}. Expected 40 character SHA-1 hex string")]
    InvalidHash { hash: String },
}

/// Errors that stop a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Manifest could not be fetched
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// An item could not be downloaded
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The parent directory of a destination could not be created
    #[error("{}", messages::CREATE_FOLDERS_FAILED)]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest name would resolve outside the install root
    #[error("Refusing to write outside the install folder: {name}")]
    UnsafePath { name: String },

    /// The run was stopped between two manifest entries
    #[error("Update cancelled")]
    Cancelled,

    /// The updated binary could not be started
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Error kinds surfaced to the observing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ManifestUnreachable,
    ManifestNotFound,
    DownloadUnreachable,
    DownloadNotFound,
    FilePermission,
    LocalReadFailure,
    Cancelled,
    LaunchFailure,
}

impl SyncError {
    /// Classify this error into one of the externally visible kinds
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Manifest(ManifestError::NotFound { .. }) => ErrorKind::ManifestNotFound,
            SyncError::Manifest(_) => ErrorKind::ManifestUnreachable,
            SyncError::Download(DownloadError::NotFound { .. }) => ErrorKind::DownloadNotFound,
            SyncError::Download(DownloadError::FilePermission { .. }) => ErrorKind::FilePermission,
            SyncError::Download(_) => ErrorKind::DownloadUnreachable,
            SyncError::CreateDirectory { .. } | SyncError::UnsafePath { .. } => {
                ErrorKind::FilePermission
            }
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::Launch(_) => ErrorKind::LaunchFailure,
        }
    }

    /// Display-ready message for the error notification
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl CacheError {
    /// Classify this error; local read problems are recovered by downloading
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::LocalRead { .. } | CacheError::LocalReadTimeout { .. } => {
                ErrorKind::LocalReadFailure
            }
            _ => ErrorKind::FilePermission,
        }
    }
}

/// Errors starting the installed application
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The binary does not exist under the install root
    #[error("Application binary not found: {path}")]
    BinaryMissing { path: PathBuf },

    /// Spawning the process failed
    #[error("Failed to start {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration file could not be read or written
    #[error("Failed to access configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No platform data directory could be resolved
    #[error("Could not determine the user data directory")]
    NoDataDirectory,

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Sync run error
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Launch error
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if re-invoking the sync could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Manifest(ManifestError::Http(_))
            | AppError::Manifest(ManifestError::ServerError { .. })
            | AppError::Manifest(ManifestError::Timeout { .. })
            | AppError::Download(DownloadError::Http(_))
            | AppError::Download(DownloadError::Timeout { .. })
            | AppError::Download(DownloadError::ServerError { .. })
            | AppError::Sync(SyncError::Cancelled) => true,

            AppError::Sync(e) => matches!(
                e.kind(),
                ErrorKind::ManifestUnreachable | ErrorKind::DownloadUnreachable
            ),

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Manifest(_) => "manifest",
            AppError::Download(_) => "download",
            AppError::Cache(_) => "cache",
            AppError::Sync(_) => "sync",
            AppError::Launch(_) => "launch",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Sync result type alias
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Launch result type alias
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
