//! Configuration for the plugin host
//!
//! Supports `~/.config/coracle/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of
//! platform defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct HostConfigFile {
    /// Plugin discovery configuration
    #[serde(default)]
    pub plugins: PluginsFileConfig,

    /// Persistent storage configuration
    #[serde(default)]
    pub storage: StorageFileConfig,
}

/// Plugin discovery configuration
#[derive(Debug, Default, Deserialize)]
pub struct PluginsFileConfig {
    /// Plugins root directory (default: `~/.coracle/plugins`)
    pub root: Option<PathBuf>,

    /// Enable plugin loading
    pub enabled: Option<bool>,
}

/// Persistent storage configuration
#[derive(Debug, Default, Deserialize)]
pub struct StorageFileConfig {
    /// SQLite database path (default: `<data dir>/coracle/store.db`)
    pub path: Option<PathBuf>,
}

impl HostConfigFile {
    /// Load from the default location, returning defaults if the file
    /// does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(parsed)
    }
}

/// Resolved host configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Plugins root directory
    pub plugins_root: PathBuf,

    /// Whether plugin loading is enabled
    pub plugins_enabled: bool,

    /// Path to the persistent key/value store
    pub storage_path: PathBuf,
}

impl Config {
    /// Build the resolved configuration from the default config file
    /// overlaid on platform defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is malformed or no home
    /// directory can be determined
    pub fn load() -> Result<Self> {
        let file = HostConfigFile::load()?;
        Self::from_file(file)
    }

    /// Resolve a parsed config file against platform defaults
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined
    pub fn from_file(file: HostConfigFile) -> Result<Self> {
        let base = directories::BaseDirs::new()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;

        let plugins_root = file
            .plugins
            .root
            .unwrap_or_else(|| base.home_dir().join(".coracle").join("plugins"));

        let storage_path = file
            .storage
            .path
            .unwrap_or_else(|| base.data_dir().join("coracle").join("store.db"));

        Ok(Self {
            plugins_root,
            plugins_enabled: file.plugins.enabled.unwrap_or(true),
            storage_path,
        })
    }
}

/// Default config file location (`~/.config/coracle/config.toml`)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("coracle").join("config.toml"))
}
