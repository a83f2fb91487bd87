//! Configuration system using TOML files.
//!
//! The first existing file wins, searched in this order:
//! - `./config/config.toml`
//! - `/config/config.toml` (container mount)
//! - `./config.toml`
//! - the OS-standard config directory:
//!   - Windows: %APPDATA%\saboriman\config.toml
//!   - macOS: ~/Library/Application Support/saboriman/config.toml
//!   - Linux: ~/.config/saboriman/config.toml
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! Command-line flags and `SABORIMAN_*` environment variables override the
//! file; see [`crate::cli`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::library::ScanConfig;
use crate::probe::DEFAULT_PROBE_TIMEOUT;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library root to scan
    pub music_folder: Option<PathBuf>,

    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,

    /// Catalog database settings
    pub database: DatabaseConfig,

    /// Scan settings
    pub scan: ScanSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_folder: None,
            log_level: "info".to_string(),
            database: DatabaseConfig::default(),
            scan: ScanSettings::default(),
        }
    }
}

/// Catalog database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(crate::db::DEFAULT_DB_NAME),
        }
    }
}

/// Scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Per-file bound on the audio probe, in seconds (0 = default)
    pub probe_timeout_secs: u64,

    /// The ffprobe binary, by name or path
    pub ffprobe_path: PathBuf,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT.as_secs(),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Config {
    /// Build the scan settings handed to the orchestrator.
    ///
    /// Extracted covers always go to `.covers` under the music folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no music folder is configured.
    pub fn scan_config(&self) -> Result<ScanConfig> {
        let root = self
            .music_folder
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::config("music_folder is not set"))?;

        let probe_timeout = match self.scan.probe_timeout_secs {
            0 => DEFAULT_PROBE_TIMEOUT,
            secs => Duration::from_secs(secs),
        };

        Ok(ScanConfig {
            probe_timeout,
            ..ScanConfig::new(root)
        })
    }

    /// SQLite URL for the configured database file.
    pub fn db_url(&self) -> String {
        crate::db::db_url(Some(self.database.path.as_path()))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the per-user config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("saboriman"))
}

/// Get the full path to the per-user config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Candidate config files, highest priority first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("config").join(CONFIG_FILE_NAME),
        PathBuf::from("/config").join(CONFIG_FILE_NAME),
        PathBuf::from(CONFIG_FILE_NAME),
    ];
    paths.extend(config_path());
    paths
}

/// The first existing config file, if any.
pub fn find_config() -> Option<PathBuf> {
    search_paths().into_iter().find(|p| p.is_file())
}

/// Load configuration from the first file found on the search path.
///
/// Returns default config if no file exists or it can't be parsed.
/// Logs but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    match find_config() {
        Some(path) => load_from(&path),
        None => {
            tracing::info!("No config file found, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match read_config(path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::error!("{}", e);
            tracing::warn!("Using default configuration");
            Config::default()
        }
    }
}

/// Read and parse a config file.
pub fn read_config(path: &Path) -> std::result::Result<Config, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Save configuration to the per-user config file.
pub fn save(config: &Config) -> std::result::Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> std::result::Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
