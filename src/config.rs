//! Configuration management for launch_sync
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, multi-source loading, and zero-config defaults.
//!
//! Sources are applied in order, later ones winning: built-in defaults, the
//! configuration file, `LAUNCH_SYNC_*` environment variables, then command
//! line flags ([`ConfigOverrides`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::client::{ClientConfig, ServiceEndpoint};
use crate::app::sync::SyncOptions;
use crate::constants::{config as files, env, install, logging, service};
use crate::errors::{ConfigError, ConfigResult};
use crate::launcher::{InstallLayout, InstallMode};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Update service settings
    pub service: ServiceConfigToml,
    /// Install layout settings
    pub install: InstallConfigToml,
    /// HTTP client settings
    pub client: ClientConfig,
    /// Sync run settings
    pub sync: SyncConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// TOML-friendly update service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfigToml {
    /// Base URL; `api/list` and `api/download` are resolved against it
    pub url: String,
    /// Key sent with every request
    pub api_key: String,
    /// Platform key (`win`, `lin`, `mac`)
    pub os_key: String,
}

impl Default for ServiceConfigToml {
    fn default() -> Self {
        Self {
            url: service::DEFAULT_URL.to_string(),
            api_key: String::new(),
            os_key: service::OS_KEY.to_string(),
        }
    }
}

/// TOML-friendly install layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfigToml {
    /// Where the layout root is placed
    pub mode: InstallMode,
    /// Explicit root; takes precedence over `mode`
    pub root: Option<PathBuf>,
    /// Folder name used by the `user_data` and `relative` modes
    pub app_folder: String,
    /// Binary started after a sync, relative to `app/`
    pub binary: String,
    /// Arguments passed to the binary
    pub binary_args: Vec<String>,
    /// Service item holding the terms text
    pub eula_item: String,
}

impl Default for InstallConfigToml {
    fn default() -> Self {
        Self {
            mode: InstallMode::default(),
            root: None,
            app_folder: install::APP_FOLDER.to_string(),
            binary: install::BINARY.to_string(),
            binary_args: install::BINARY_ARGS.iter().map(|s| s.to_string()).collect(),
            eula_item: install::EULA_ITEM.to_string(),
        }
    }
}

impl InstallConfigToml {
    /// Mode after applying the `root` override
    pub fn effective_mode(&self) -> InstallMode {
        match &self.root {
            Some(root) => InstallMode::Custom(root.clone()),
            None => self.mode.clone(),
        }
    }
}

/// TOML-friendly sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfigToml {
    /// Fail a download whose byte count differs from the manifest size
    pub strict_size: bool,
    /// Start the application after a complete sync
    pub launch: bool,
}

impl Default for SyncConfigToml {
    fn default() -> Self {
        let options = SyncOptions::default();
        Self {
            strict_size: options.strict_size,
            launch: options.launch,
        }
    }
}

impl SyncConfigToml {
    /// Convert to runtime SyncOptions
    pub fn to_runtime_config(&self) -> SyncOptions {
        SyncOptions {
            strict_size: self.strict_size,
            launch: self.launch,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub service_url: Option<String>,
    pub os_key: Option<String>,
    pub install_root: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment
    ///
    /// An explicitly given file must exist; otherwise the standard locations
    /// are searched and a missing file simply leaves the defaults in place.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Self::load_from_file(&path).await?
            }
            None => match Self::find_config_file() {
                Some(path) => Self::load_from_file(&path).await?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `LAUNCH_SYNC_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides looked up through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = value(env::SERVICE_URL) {
            debug!("{} overrides service URL", env::SERVICE_URL);
            self.service.url = url;
        }
        if let Some(api_key) = value(env::API_KEY) {
            debug!("{} overrides API key", env::API_KEY);
            self.service.api_key = api_key;
        }
        if let Some(os_key) = value(env::OS_KEY) {
            self.service.os_key = os_key;
        }
        if let Some(root) = value(env::INSTALL_ROOT) {
            self.install.root = Some(PathBuf::from(root));
        }
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.service_url {
            self.service.url = url.clone();
        }
        if let Some(os_key) = &overrides.os_key {
            self.service.os_key = os_key.clone();
        }
        if let Some(root) = &overrides.install_root {
            self.install.root = Some(root.clone());
        }
    }

    /// Check the values needed to talk to the update service and start the app
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Url::parse(&self.service.url) {
            errors.push(format!("service.url '{}' is not a valid URL: {}", self.service.url, e));
        }
        if self.service.api_key.trim().is_empty() {
            errors.push(format!(
                "service.api_key is empty (set it in the config file or {})",
                env::API_KEY
            ));
        }
        if self.service.os_key.trim().is_empty() {
            errors.push("service.os_key is empty".to_string());
        }
        if self.install.binary.trim().is_empty() {
            errors.push("install.binary is empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Endpoint of the configured update service
    pub fn endpoint(&self) -> ConfigResult<ServiceEndpoint> {
        ServiceEndpoint::new(&self.service.url, &self.service.api_key, &self.service.os_key)
            .map_err(|e| ConfigError::InvalidValue {
                field: "service.url".to_string(),
                value: self.service.url.clone(),
                reason: e.to_string(),
            })
    }

    /// Resolved install layout
    pub fn layout(&self) -> ConfigResult<InstallLayout> {
        InstallLayout::resolve(
            &self.install.effective_mode(),
            &self.install.app_folder,
            &self.install.binary,
        )
    }

    pub fn sync_options(&self) -> SyncOptions {
        self.sync.to_runtime_config()
    }

    /// Initialize configuration on first run
    ///
    /// Creates a commented default config file if none exists. Returns the
    /// path when a file was written.
    pub async fn initialize_first_run() -> ConfigResult<Option<PathBuf>> {
        let config_path = Self::default_config_path()?;
        Self::initialize_at(&config_path).await
    }

    async fn initialize_at(config_path: &Path) -> ConfigResult<Option<PathBuf>> {
        if config_path.exists() {
            return Ok(None);
        }

        let io_error = |source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        };

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(config_path, Self::generate_default_config_content())
            .await
            .map_err(io_error)?;

        info!("Created default configuration file: {}", config_path.display());
        Ok(Some(config_path.to_path_buf()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_CONFIG_FILE)];
        if let Ok(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDataDirectory)?;
        Ok(config_dir
            .join(files::CONFIG_DIR_NAME)
            .join(files::CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config: AppConfig = toml::from_str(&content)?;
        config.source = Some(path.to_path_buf());

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration content with comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# launch_sync configuration
# This file was generated on first run. Every key is optional.

[service]
# Update service base URL
url = "{url}"
# Key sent with every request (or set {api_key_env})
api_key = ""
# Platform key: win, lin or mac
os_key = "{os_key}"

[install]
# user_data: <home or app data dir>/<app_folder>
# relative:  <app_folder> in the working directory
mode = "user_data"
# root = "/path/to/install"  # Explicit root, overrides mode
app_folder = "{app_folder}"
binary = "{binary}"
binary_args = ["launcher"]
eula_item = "{eula_item}"

[client]
request_timeout = "60s"
connect_timeout = "30s"
# Longest silence allowed between two chunks of a download
chunk_timeout = "60s"
tcp_keepalive = "30s"
tcp_nodelay = true

[sync]
# Fail when a download's size differs from the manifest
strict_size = false
# Start the application after a complete sync
launch = true

[logging]
level = "warn"  # error, warn, info, debug, trace
"#,
            url = service::DEFAULT_URL,
            api_key_env = env::API_KEY,
            os_key = service::OS_KEY,
            app_folder = install::APP_FOLDER,
            binary = install::BINARY,
            eula_item = install::EULA_ITEM,
        )
    }
}
