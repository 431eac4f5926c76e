//! Typed configuration loaded from `config.toml`.
//!
//! Grounded in the teacher's `toml` + `serde` based config loader
//! (`config/src/main.rs` read/rewrote the same file this module reads);
//! here it is read-only and exposed through a lazily-initialized global,
//! matching the `CONFIG.get_*()` accessor style used throughout the
//! teacher's `server`/`client` binaries.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_data_dir() -> String {
    "~/.hillside".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_catchup_retries() -> u32 {
    5
}

fn default_catchup_timeout_secs() -> u64 {
    1
}

fn default_backup_window() -> u64 {
    10
}

fn default_max_chain_jump() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, rename = "hillside")]
    hillside: HillsideSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HillsideSection {
    #[serde(default = "default_data_dir")]
    data_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_catchup_retries")]
    catchup_retries: u32,
    #[serde(default = "default_catchup_timeout_secs")]
    catchup_timeout_secs: u64,
    #[serde(default = "default_backup_window")]
    backup_window: u64,
    #[serde(default = "default_max_chain_jump")]
    max_chain_jump: u64,
}

impl Default for HillsideSection {
    fn default() -> Self {
        HillsideSection {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            catchup_retries: default_catchup_retries(),
            catchup_timeout_secs: default_catchup_timeout_secs(),
            backup_window: default_backup_window(),
            max_chain_jump: default_max_chain_jump(),
        }
    }
}

/// Runtime-tunable settings for the ratchet window, catch-up retry policy,
/// and local persistence location.
#[derive(Debug, Clone)]
pub struct Config {
    inner: HillsideSection,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    /// Parse a `config.toml` from disk. Missing keys fall back to defaults,
    /// so a minimal or absent `[hillside]` table still produces a usable
    /// config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)?;
        Ok(Config { inner: file.hillside })
    }

    /// The defaults documented in the spec's external interfaces section,
    /// used when no `config.toml` is present.
    pub fn defaults() -> Config {
        Config {
            inner: HillsideSection::default(),
        }
    }

    /// Install this config as the process-wide global. Returns an error if
    /// a global config was already installed.
    pub fn install_global(self) -> Result<(), Config> {
        CONFIG.set(self)
    }

    /// The process-wide config, falling back to defaults if none was
    /// installed via [`Config::install_global`].
    pub fn global() -> &'static Config {
        CONFIG.get_or_init(Config::defaults)
    }

    pub fn get_data_dir(&self) -> String {
        self.inner.data_dir.clone()
    }

    pub fn get_log_level(&self) -> String {
        self.inner.log_level.clone()
    }

    pub fn get_catchup_retries(&self) -> u32 {
        self.inner.catchup_retries
    }

    pub fn get_catchup_timeout_secs(&self) -> u64 {
        self.inner.catchup_timeout_secs
    }

    pub fn get_backup_window(&self) -> u64 {
        self.inner.backup_window
    }

    pub fn get_max_chain_jump(&self) -> u64 {
        self.inner.max_chain_jump
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = Config::defaults();
        assert_eq!(cfg.get_backup_window(), 10);
        assert_eq!(cfg.get_max_chain_jump(), 10_000);
        assert_eq!(cfg.get_catchup_retries(), 5);
        assert_eq!(cfg.get_catchup_timeout_secs(), 1);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = std::env::temp_dir().join(format!("hillside-cfg-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[hillside]\nlog_level = \"debug\"\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.get_log_level(), "debug");
        assert_eq!(cfg.get_backup_window(), 10);
        std::fs::remove_dir_all(&dir).ok();
    }
}
