//! Application constants for launch_sync
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for configuration overrides
pub mod env {
    /// Overrides `[service] url`
    pub const SERVICE_URL: &str = "LAUNCH_SYNC_SERVICE_URL";

    /// Overrides `[service] api_key`
    pub const API_KEY: &str = "LAUNCH_SYNC_API_KEY";

    /// Overrides `[service] os_key`
    pub const OS_KEY: &str = "LAUNCH_SYNC_OS_KEY";

    /// Overrides `[install] root`
    pub const INSTALL_ROOT: &str = "LAUNCH_SYNC_INSTALL_ROOT";
}

/// Update service endpoints
pub mod service {
    /// Default update service base URL
    pub const DEFAULT_URL: &str = "http://localhost:3000/";

    /// Path of the manifest listing endpoint, relative to the service URL
    pub const LIST_PATH: &str = "api/list";

    /// Path of the single-item download endpoint, relative to the service URL
    pub const DOWNLOAD_PATH: &str = "api/download";

    /// Query parameter carrying the API key
    pub const KEY_PARAM: &str = "key";

    /// Query parameter carrying the platform key
    pub const OS_PARAM: &str = "os";

    /// Query parameter carrying the item name on downloads
    pub const ITEM_PARAM: &str = "item";

    /// Platform key sent to the service for this build target
    #[cfg(target_os = "windows")]
    pub const OS_KEY: &str = "win";
    #[cfg(target_os = "macos")]
    pub const OS_KEY: &str = "mac";
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    pub const OS_KEY: &str = "lin";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("launch_sync/", env!("CARGO_PKG_VERSION"));

    /// Timeout for the manifest request as a whole
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Longest silence tolerated between two body chunks of a transfer
    pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(60);

    /// TCP keep-alive interval
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

    /// Header values that disable intermediate and client caching
    pub const NO_CACHE: &str = "no-cache, no-store";
    pub const PRAGMA_NO_CACHE: &str = "no-cache";

    /// HTTP status used by the service for unknown items, keys or platforms
    pub const NOT_FOUND: u16 = 404;
}

/// File operation constants
pub mod files {
    /// Read buffer size used when hashing local files (64KB)
    pub const HASH_READ_CHUNK_SIZE: usize = 64 * 1024;

    /// Prefix of the temporary file written while persisting the hash cache
    pub const HASH_CACHE_TEMP_PREFIX: &str = ".sha1-";

    /// Suffix of the temporary file written while persisting the hash cache
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";
}

/// Install layout naming
pub mod install {
    /// Application folder name under the resolved data directory
    #[cfg(target_os = "windows")]
    pub const APP_FOLDER: &str = "LaunchSync";
    #[cfg(not(target_os = "windows"))]
    pub const APP_FOLDER: &str = ".launch-sync";

    /// Sub-folder holding the synced application files
    pub const APP_SUBDIR: &str = "app";

    /// Hash cache file name under the layout root
    pub const HASH_CACHE_FILE: &str = ".sha1";

    /// Terms-accepted marker file name under the layout root
    pub const EULA_MARKER_FILE: &str = ".eula";

    /// Name of the terms document item on the update service
    pub const EULA_ITEM: &str = "eula_and_terms.md";

    /// Binary started once the update has finished
    #[cfg(target_os = "windows")]
    pub const BINARY: &str = "app.exe";
    #[cfg(not(target_os = "windows"))]
    pub const BINARY: &str = "app";

    /// Argument passed to the started binary
    pub const BINARY_ARGS: &[&str] = &["launcher"];
}

/// Messages shown by the launcher front end
pub mod messages {
    /// Window title
    pub const APP_TITLE: &str = "Application Launcher";

    /// Header while updating an existing installation
    pub const HEADER_TEXT: &str = "Updating application, please wait...";

    /// Header on the very first installation
    pub const FIRST_TIME_HEADER_TEXT: &str = "Downloading application for the first time...";

    /// Directory creation failure message
    pub const CREATE_FOLDERS_FAILED: &str =
        "Unable to create folders for application update. Check your permissions.";

    /// Destination file could not be opened for writing
    pub const SAVE_FAILED: &str = "Failed to save updates to software. Check your write permissions.";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";

    /// Target used for the crate's env filter directive
    pub const CRATE_TARGET: &str = "launch_sync";
}

/// Configuration file discovery
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "launch-sync.toml";

    /// Directory name under the user config dir
    pub const CONFIG_DIR_NAME: &str = "launch-sync";

    /// Configuration file name under the user config dir
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use install::{EULA_ITEM, HASH_CACHE_FILE};
pub use service::OS_KEY;
