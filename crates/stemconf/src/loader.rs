//! Config file discovery, layered merging, and environment variable overlay.

use crate::{ConfigError, StemConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only existing files
/// are returned.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/stemchart/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("stemchart/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("stemchart.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read one config file as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`. Nested tables merge key by key, anything
/// else in `overlay` replaces the value in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Deserialize a merged table into a full config, filling gaps with defaults.
pub fn from_table(table: toml::Table) -> Result<StemConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Invalid {
            message: e.to_string(),
        })
}

/// Apply `STEMCHART_*` (and `RUST_LOG`) overrides from the process environment.
pub fn apply_env_overrides(config: &mut StemConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit list of variables.
///
/// Values that fail to parse are skipped and not recorded as overrides.
pub fn apply_overrides_from<I>(config: &mut StemConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let applied = match key.as_str() {
            "STEMCHART_ASSET_DIR" => {
                config.infra.paths.asset_dir = Some(expand_path(&value));
                true
            }
            "STEMCHART_LOG_LEVEL" | "RUST_LOG" => {
                config.infra.telemetry.log_level = value;
                true
            }
            "STEMCHART_EXTENSION" => {
                config.bootstrap.assets.extension = value.trim_start_matches('.').to_string();
                true
            }
            "STEMCHART_LOOPING" => match parse_bool(&value) {
                Some(looping) => {
                    config.bootstrap.playback.looping = looping;
                    true
                }
                None => false,
            },
            "STEMCHART_VOLUME" => match value.parse() {
                Ok(volume) => {
                    config.bootstrap.playback.volume = volume;
                    true
                }
                Err(_) => false,
            },
            "STEMCHART_SEED" => match value.parse() {
                Ok(seed) => {
                    config.bootstrap.chart.seed = Some(seed);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand `~/` and a leading `$VAR/` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        return directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path));
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.find('/') {
            Some(slash) => (&stripped[..slash], Some(&stripped[slash + 1..])),
            None => (stripped, None),
        };
        if let Ok(var_value) = env::var(var_name) {
            let base = PathBuf::from(var_value);
            return match rest {
                Some(rest) => base.join(rest),
                None => base,
            };
        }
    }

    PathBuf::from(path)
}
