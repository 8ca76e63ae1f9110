//! Host-level configuration for the plugin subsystem.
//!
//! [`PluginHostConfig`] is read from TOML and then overlaid with
//! `PILOTIS_*` environment variables. The environment is supplied through a
//! lookup closure so callers (and tests) decide where values come from.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default entry-marker file name inside a package directory.
pub const DEFAULT_ENTRY_MARKER: &str = "plugin.toml";

/// Default header carrying the catalog API key.
pub const DEFAULT_KEY_HEADER: &str = "X-Api-Key";

const DEFAULT_INSTALL_ROOT: &str = "plugins";
const DEFAULT_CATALOG_URL: &str = "https://catalog.invalid/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const ENV_INSTALL_ROOT: &str = "PILOTIS_INSTALL_ROOT";
const ENV_BUNDLED_ROOTS: &str = "PILOTIS_BUNDLED_ROOTS";
const ENV_ENTRY_MARKER: &str = "PILOTIS_ENTRY_MARKER";
const ENV_CATALOG_URL: &str = "PILOTIS_CATALOG_URL";
const ENV_CATALOG_KEY: &str = "PILOTIS_CATALOG_KEY";
const ENV_CATALOG_TIMEOUT: &str = "PILOTIS_CATALOG_TIMEOUT";

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("invalid plugin host configuration: {0}")]
    Parse(String),

    /// The entry marker is empty.
    #[error("entry marker must not be empty")]
    EmptyEntryMarker,

    /// The entry marker is a path rather than a file name.
    #[error("entry marker '{0}' must be a plain file name")]
    EntryMarkerNotFileName(String),

    /// The catalog timeout is zero.
    #[error("catalog timeout must be greater than zero")]
    ZeroTimeout,

    /// An environment override could not be parsed.
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidEnvValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Remote catalog connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog API base URL.
    pub base_url: String,
    /// Static API key, sent when present.
    pub api_key: Option<String>,
    /// Header carrying the API key.
    pub key_header: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_CATALOG_URL),
            api_key: None,
            key_header: String::from(DEFAULT_KEY_HEADER),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CatalogConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Plugin host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginHostConfig {
    /// Directory packages are installed into.
    pub install_root: PathBuf,
    /// Read-only directories of packages shipped with the host.
    pub bundled_roots: Vec<PathBuf>,
    /// File marking a directory as a package.
    pub entry_marker: String,
    /// Remote catalog settings.
    pub catalog: CatalogConfig,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            bundled_roots: Vec::new(),
            entry_marker: String::from(DEFAULT_ENTRY_MARKER),
            catalog: CatalogConfig::default(),
        }
    }
}

impl PluginHostConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or
    /// validation errors for out-of-range values.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays `PILOTIS_*` variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvValue`] for an unparsable timeout, or
    /// validation errors for the resulting configuration.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(root) = lookup(ENV_INSTALL_ROOT) {
            self.install_root = PathBuf::from(root);
        }
        if let Some(roots) = lookup(ENV_BUNDLED_ROOTS) {
            self.bundled_roots = roots
                .split(':')
                .filter(|root| !root.trim().is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Some(marker) = lookup(ENV_ENTRY_MARKER) {
            self.entry_marker = marker;
        }
        if let Some(url) = lookup(ENV_CATALOG_URL) {
            self.catalog.base_url = url;
        }
        if let Some(key) = lookup(ENV_CATALOG_KEY) {
            self.catalog.api_key = Some(key).filter(|value| !value.is_empty());
        }
        if let Some(raw) = lookup(ENV_CATALOG_TIMEOUT) {
            self.catalog.timeout_secs =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnvValue {
                        key: ENV_CATALOG_TIMEOUT,
                        value: raw.clone(),
                    })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Overlays variables from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::with_env_overrides`].
    pub fn with_process_env(self) -> Result<Self, ConfigError> {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let marker = self.entry_marker.trim();
        if marker.is_empty() {
            return Err(ConfigError::EmptyEntryMarker);
        }
        if marker.contains(['/', '\\']) || marker == "." || marker == ".." {
            return Err(ConfigError::EntryMarkerNotFileName(self.entry_marker.clone()));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
