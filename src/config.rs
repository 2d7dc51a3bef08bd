//! # Card Configuration
//!
//! TOML configuration for the card application: board revision, update server and the
//! line pin map.
//!
//! ```toml
//! [card]
//! revision = 3
//!
//! [update]
//! host = "retrostore.org"
//! port = 80
//!
//! [pins]
//! data_base = 12
//! select = 23
//! ```
//!
//! Every field has a default, so any section may be left out.
//!
//! ```rust
//! use retrocard_rs::config::Config;
//! let config: Config = toml::from_str("[card]\nrevision = 4\n").unwrap();
//! assert_eq!(config.card.revision, 4);
//! assert_eq!(config.update.port, 80);
//! assert_eq!(config.pins.select, 23);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use retrocard_shared::PinMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub card: CardConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub pins: PinMap,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CardConfig {
    /// Hardware revision; selects the firmware channel on the update server.
    #[serde(default = "default_revision")]
    pub revision: u32,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self { revision: default_revision() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Directory holding the flash partition images.
    #[serde(default = "default_partition_dir")]
    pub partition_dir: PathBuf,
    /// File backing the persisted key-value store.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Raise the update trigger once at startup.
    #[serde(default)]
    pub check_on_start: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            partition_dir: default_partition_dir(),
            storage_path: default_storage_path(),
            check_on_start: false,
        }
    }
}

impl UpdateConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn default_revision() -> u32 { 3 }
fn default_host() -> String { "retrostore.org".to_string() }
fn default_port() -> u16 { 80 }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_read_timeout_ms() -> u64 { 10_000 }
fn default_partition_dir() -> PathBuf { PathBuf::from("flash") }
fn default_storage_path() -> PathBuf { PathBuf::from("nvs.toml") }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_file_overrides_defaults() {
        let toml_str = r#"
            [card]
            revision = 5

            [update]
            host = "updates.local"
            port = 8080
            read_timeout_ms = 250
            check_on_start = true

            [pins]
            data_base = 0
            read_dir_active_low = true
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.card.revision, 5);
        assert_eq!(config.update.host, "updates.local");
        assert_eq!(config.update.port, 8080);
        assert_eq!(config.update.read_timeout(), Duration::from_millis(250));
        assert_eq!(config.update.connect_timeout(), Duration::from_millis(5000));
        assert!(config.update.check_on_start);
        assert_eq!(config.pins.data_base, 0);
        assert!(config.pins.read_dir_active_low);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.card.revision, 3);
        assert_eq!(config.update.storage_path, PathBuf::from("nvs.toml"));
        assert_eq!(config.pins, PinMap::default());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_config(missing.to_str().unwrap()), Err(ConfigError::Io(_))));

        let bad = dir.path().join("bad.toml");
        std::fs::File::create(&bad).unwrap().write_all(b"[card\nrevision = ").unwrap();
        assert!(matches!(load_config(bad.to_str().unwrap()), Err(ConfigError::Toml(_))));
    }
}
