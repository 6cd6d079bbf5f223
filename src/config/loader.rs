// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Set to `true` to force recurrence batching regardless of the file.
pub const GROUPING_ENV_VAR: &str = "ENABLE_REPETITION_GROUPING";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check value
/// ranges. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path, validate it and apply environment
/// overrides.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(apply_env_overrides(ConfigFile::default(), |key| {
            std::env::var(key).ok()
        }));
    }
    load_and_validate(path)
}

/// Apply overrides read through `lookup`.
pub fn apply_env_overrides(
    mut config: ConfigFile,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigFile {
    if lookup(GROUPING_ENV_VAR).is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
        debug!("{GROUPING_ENV_VAR} set; grouping by recurrence");
        config.force_group_by_recurrence();
    }
    config
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Choreshift.toml")
}
