//! Configuration module for perfstream
//!
//! Configuration lives in a single TOML file:
//!
//! ```toml
//! [logging]
//! filter = "info,perfstream=debug"
//!
//! [encoding]
//! frame_capacity = 16777216
//!
//! [[sources]]
//! id = "dummy"
//! type = "synthetic"
//! name = "Synthetic data"
//! anchor = "2024-01-01"
//! seed = 24301
//! ```
//!
//! # Location
//!
//! Without `--config`, the file is looked up in the platform config directory:
//! - **Linux**: `~/.config/perfstream/config.toml`
//! - **macOS**: `~/Library/Application Support/perfstream/config.toml`
//! - **Windows**: `%APPDATA%\perfstream\config.toml`

use crate::encoding::DEFAULT_FRAME_CAPACITY;
use crate::error::{PerfStreamError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "perfstream";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,perfstream=debug";

/// Path of the config file in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub encoding: EncodingConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            encoding: EncodingConfig::default(),
            sources: vec![SourceConfig::synthetic("dummy")],
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PerfStreamError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PerfStreamError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the file at the default location if there
    /// is one, else the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PerfStreamError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PerfStreamError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PerfStreamError::Config(format!("Failed to write config: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.encoding.frame_capacity == 0 {
            return Err(PerfStreamError::Config(
                "encoding.frame_capacity must be positive".to_string(),
            ));
        }
        if self.encoding.frame_capacity > u32::MAX as usize {
            return Err(PerfStreamError::Config(format!(
                "encoding.frame_capacity must not exceed {}",
                u32::MAX
            )));
        }
        Ok(())
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string. `RUST_LOG` wins over it.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// `[encoding]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Payload capacity of one framed block, in bytes
    pub frame_capacity: usize,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
        }
    }
}

/// One `[[sources]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,

    /// Source type, e.g. `synthetic`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Last day of generated data (synthetic sources). Defaults to today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<NaiveDate>,

    /// Seed of generated tables (synthetic sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SourceConfig {
    pub fn synthetic(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: "synthetic".to_string(),
            name: None,
            anchor: None,
            seed: None,
        }
    }
}
