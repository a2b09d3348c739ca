//! Application configuration
//!
//! Loaded from `config.yaml`. Every section and field is optional; a missing
//! file yields the defaults.

pub mod watcher;

use crate::state::BackendKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub use watcher::ProfileWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

/// Serial device settings (8N1 framing is fixed)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Wait after a failed open before trying again
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Quiet period after opening while the device resets
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            retry_backoff_ms: default_retry_backoff_ms(),
            settle_ms: default_settle_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

/// Worker loop timing
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkerConfig {
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Tick length while no profile is loaded
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,
    #[serde(default = "default_backend")]
    pub default_backend: BackendKind,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            idle_delay_ms: default_idle_delay_ms(),
            default_backend: default_backend(),
        }
    }
}

impl WorkerConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }
}

/// Document locations, relative to the data directory unless absolute
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FilesConfig {
    #[serde(default = "default_profiles_file")]
    pub profiles: PathBuf,
    #[serde(default = "default_keybinds_file")]
    pub keybinds: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles_file(),
            keybinds: default_keybinds_file(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file; a missing file gives defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    /// Parse YAML text; an empty document gives defaults
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            anyhow::bail!("serial.port cannot be empty");
        }
        if self.serial.baud_rate == 0 {
            anyhow::bail!("serial.baud_rate must be positive");
        }
        if self.worker.idle_delay_ms == 0 {
            anyhow::bail!("worker.idle_delay_ms must be at least 1");
        }
        Ok(())
    }

    /// Resolve a document path against the data directory
    pub fn resolve(base: &Path, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            base.join(file)
        }
    }
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM7".to_string()
    } else {
        "/dev/ttyACM0".to_string()
    }
}
fn default_baud_rate() -> u32 { 9600 }
fn default_retry_backoff_ms() -> u64 { 1000 }
fn default_settle_ms() -> u64 { 2000 }
fn default_write_timeout_ms() -> u64 { 100 }
fn default_startup_delay_ms() -> u64 { 250 }
fn default_idle_delay_ms() -> u64 { 10 }
fn default_backend() -> BackendKind { BackendKind::Native }
fn default_profiles_file() -> PathBuf { PathBuf::from("profiles.json") }
fn default_keybinds_file() -> PathBuf { PathBuf::from("keybinds.json") }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::parse("serial:\n  port: COM3\n").unwrap();
        assert_eq!(config.serial.port, "COM3");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.worker, WorkerConfig::default());
        assert_eq!(config.files.profiles, PathBuf::from("profiles.json"));
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
serial:
  port: "/dev/ttyUSB1"
  baud_rate: 115200
  retry_backoff_ms: 500
  settle_ms: 0
worker:
  startup_delay_ms: 0
  idle_delay_ms: 20
  default_backend: serial
files:
  profiles: "/opt/drift/p.json"
"#;
        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.settle_ms, 0);
        assert_eq!(config.serial.write_timeout_ms, 100);
        assert_eq!(config.worker.default_backend, BackendKind::Serial);
        assert_eq!(config.worker.idle_delay(), Duration::from_millis(20));
        assert_eq!(config.files.keybinds, PathBuf::from("keybinds.json"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::parse("serial:\n  port: \"\"\n").is_err());
        assert!(AppConfig::parse("worker:\n  idle_delay_ms: 0\n").is_err());
        assert!(AppConfig::parse("worker:\n  default_backend: bluetooth\n").is_err());
    }

    #[test]
    fn test_load_missing_and_empty_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());

        std::fs::write(&path, "").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Path::new("/data");
        assert_eq!(
            AppConfig::resolve(base, Path::new("profiles.json")),
            PathBuf::from("/data/profiles.json")
        );
        let abs = std::env::temp_dir().join("x.json");
        assert_eq!(AppConfig::resolve(base, &abs), abs);
    }
}
