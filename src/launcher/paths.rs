//! Install layout
//!
//! Everything the launcher keeps lives under one root folder:
//!
//! ```text
//! <root>/
//!   app/     synced application files (the install root of a sync run)
//!   .sha1    hash cache
//!   .eula    present once the terms have been accepted
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::install;
use crate::errors::{ConfigError, ConfigResult};

/// Where the layout root is placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    /// `<user data dir>/<app folder>`
    #[default]
    UserData,
    /// `<app folder>` relative to the working directory
    Relative,
    /// An explicit root
    Custom(PathBuf),
}

/// Resolved paths of one installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    app_dir: PathBuf,
    cache_file: PathBuf,
    eula_marker: PathBuf,
    binary: PathBuf,
}

impl InstallLayout {
    /// Resolve the layout for `mode`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoDataDirectory` if `UserData` is requested and no
    /// platform data directory can be determined
    pub fn resolve(mode: &InstallMode, app_folder: &str, binary: &str) -> ConfigResult<Self> {
        let root = match mode {
            InstallMode::UserData => user_data_dir()
                .ok_or(ConfigError::NoDataDirectory)?
                .join(app_folder),
            InstallMode::Relative => PathBuf::from(app_folder),
            InstallMode::Custom(root) => root.clone(),
        };

        debug!("Install layout root: {}", root.display());
        Ok(Self::from_root(root, binary))
    }

    /// Layout under an explicit root
    pub fn from_root(root: impl Into<PathBuf>, binary: &str) -> Self {
        let root = root.into();
        let app_dir = root.join(install::APP_SUBDIR);
        Self {
            cache_file: root.join(install::HASH_CACHE_FILE),
            eula_marker: root.join(install::EULA_MARKER_FILE),
            binary: app_dir.join(binary),
            app_dir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder the manifest is synced into
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn eula_marker(&self) -> &Path {
        &self.eula_marker
    }

    /// Application binary started after a sync
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Nothing has been installed yet
    pub fn first_install(&self) -> bool {
        !self.app_dir.exists()
    }

    /// An application binary is present to fall back on
    pub fn previous_install(&self) -> bool {
        self.binary.exists()
    }

    pub fn eula_accepted(&self) -> bool {
        self.eula_marker.exists()
    }

    /// Create the (empty) terms-accepted marker
    pub async fn accept_eula(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&self.eula_marker, b"").await
    }

    /// Remove the marker; returns whether it existed
    pub async fn reset_eula(&self) -> io::Result<bool> {
        match tokio::fs::remove_file(&self.eula_marker).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Base directory for `InstallMode::UserData`
///
/// Roaming application data on Windows, the home directory elsewhere (the
/// folder name is hidden there).
fn user_data_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::data_dir()
    } else {
        dirs::home_dir()
    }
}
