//! Configuration loading for stemchart.
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`InfraConfig`): asset location and log level.
//! - **Bootstrap** (`BootstrapConfig`): values that seed the playback session
//!   (clock timing, output level, chart shape).
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, merged table by table):
//! 1. `/etc/stemchart/config.toml` (system)
//! 2. `~/.config/stemchart/config.toml` (user)
//! 3. `./stemchart.toml` or the `--config` path (local override)
//! 4. Environment variables (`STEMCHART_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! asset_dir = "~/stems"
//!
//! [telemetry]
//! log_level = "debug"
//!
//! [playback]
//! tick_interval_ms = 100
//! tick_increment = 0.22
//! max_position = 10.5
//! volume = 0.7
//! looping = true
//!
//! [assets]
//! extension = "wav"
//!
//! [chart]
//! points_per_channel = 200
//! jitter = 5
//! ```

pub mod bootstrap;
pub mod infra;
pub mod loader;

pub use bootstrap::{AssetConfig, BootstrapConfig, ChartConfig, PlaybackConfig};
pub use infra::{InfraConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Complete stemchart configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,

    #[serde(flatten)]
    pub bootstrap: BootstrapConfig,
}

impl StemConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an optional CLI-provided file, then apply env overrides.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = Self::from_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    /// Merge the given files in order, without consulting the environment.
    pub fn from_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        Ok((loader::from_table(merged)?, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }
}
