//! Configuration module for the conda channel server.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CONDA_SERVER_` and use double
//! underscores to separate nested levels:
//! - `CONDA_SERVER_CHANNEL_DIR=/srv/channel` sets `channel_dir`
//! - `CONDA_SERVER_WATCH__DEBOUNCE_MS=250` sets `watch.debounce_ms`
//! - `CONDA_SERVER_LOCKS__STALE_AFTER_SECS=0` disables stale lock reclaim

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lock::LockOptions;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "conda-server.toml";

pub const ENV_PREFIX: &str = "CONDA_SERVER_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Channel directory holding the platform subdirectories
    #[serde(default = "default_channel_dir")]
    pub channel_dir: PathBuf,

    /// Lock file behavior shared by writers and the index coordinator
    #[serde(default)]
    pub locks: LockConfig,

    /// Index generation settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Change watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LockConfig {
    /// Delay between attempts on a held lock
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting for a lock after this many seconds (0 waits forever)
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Lock files untouched for this long are reclaimed (0 never reclaims)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Indexer command; the channel directory is appended as last argument
    #[serde(default = "default_index_command")]
    pub command: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Re-index automatically when packages change
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period before a batch of changes triggers indexing
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Longest a batch may be postponed by continuous changes
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// How often pending batches are checked
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for everything
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, keyed by component (`watcher`) or target path
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_channel_dir() -> PathBuf {
    PathBuf::from("packages")
}
fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_acquire_timeout_secs() -> u64 {
    30
}
fn default_stale_after_secs() -> u64 {
    600
}
fn default_index_command() -> Vec<String> {
    ["python", "-m", "conda_index"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    5000
}
fn default_tick_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            channel_dir: default_channel_dir(),
            locks: LockConfig::default(),
            index: IndexConfig::default(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl LockConfig {
    pub fn options(&self) -> LockOptions {
        LockOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: (self.acquire_timeout_secs > 0)
                .then(|| Duration::from_secs(self.acquire_timeout_secs)),
            stale_after: (self.stale_after_secs > 0)
                .then(|| Duration::from_secs(self.stale_after_secs)),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            command: default_index_command(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            debounce_ms: default_debounce_ms(),
            max_delay_ms: default_max_delay_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// `config` overrides the default `conda-server.toml` in the working
    /// directory. A missing file is not an error; defaults apply.
    pub fn load(config: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file at `path`
    pub fn init_config_file(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
        if !force && path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.channel_dir, PathBuf::from("packages"));
        assert_eq!(settings.index.command, vec!["python", "-m", "conda_index"]);
        assert!(settings.watch.enabled);
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_lock_options() {
        let options = LockConfig::default().options();
        assert_eq!(options, LockOptions::default());

        let forever = LockConfig {
            poll_interval_ms: 0,
            acquire_timeout_secs: 0,
            stale_after_secs: 0,
        }
        .options();
        assert_eq!(forever.timeout, None);
        assert_eq!(forever.stale_after, None);
        assert_eq!(forever.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("conda-server.toml");

        let toml_content = r#"
version = 2
channel_dir = "/srv/conda"

[locks]
acquire_timeout_secs = 5

[index]
command = ["conda-index", "--no-progress"]

[watch]
enabled = false
debounce_ms = 250

[logging]
default = "warn"

[logging.modules]
"conda_server::index" = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.channel_dir, PathBuf::from("/srv/conda"));
        assert_eq!(settings.locks.acquire_timeout_secs, 5);
        assert_eq!(settings.index.command, vec!["conda-index", "--no-progress"]);
        assert!(!settings.watch.enabled);
        assert_eq!(settings.watch.debounce_ms, 250);
        assert_eq!(settings.logging.default, "warn");
        assert_eq!(settings.logging.modules["conda_server::index"], "debug");
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("conda-server.toml");

        let mut settings = Settings::default();
        settings.channel_dir = PathBuf::from("/tmp/channel");
        settings.watch.tick_ms = 20;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.channel_dir, PathBuf::from("/tmp/channel"));
        assert_eq!(loaded.watch.tick_ms, 20);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("conda-server.toml");

        // Only specify a few settings
        let toml_content = r#"
[locks]
poll_interval_ms = 10
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified values
        assert_eq!(settings.locks.poll_interval_ms, 10);

        // Default values should still be present
        assert_eq!(settings.version, 1);
        assert_eq!(settings.locks.acquire_timeout_secs, 30);
        assert_eq!(settings.index.command.len(), 3);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load(Some(temp_dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(settings.channel_dir, PathBuf::from("packages"));
    }

    #[test]
    fn test_layered_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("conda-server.toml");

        let toml_content = r#"
[locks]
stale_after_secs = 120

[watch]
max_delay_ms = 3000
"#;
        fs::write(&config_path, toml_content).unwrap();

        // Set environment variables that should override config file
        unsafe {
            std::env::set_var("CONDA_SERVER_WATCH__MAX_DELAY_MS", "9000");
        }

        let settings = Settings::load(Some(config_path.as_path())).unwrap();

        // Environment variable should override config file
        assert_eq!(settings.watch.max_delay_ms, 9000);
        // Config file value should be used when no env var
        assert_eq!(settings.locks.stale_after_secs, 120);

        // Clean up
        unsafe {
            std::env::remove_var("CONDA_SERVER_WATCH__MAX_DELAY_MS");
        }
    }

    #[test]
    fn test_init_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("conda-server.toml");

        Settings::init_config_file(&config_path, false).unwrap();
        assert!(config_path.exists());
        assert!(Settings::init_config_file(&config_path, false).is_err());
        Settings::init_config_file(&config_path, true).unwrap();
    }
}
