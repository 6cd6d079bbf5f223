// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ChoreError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ChoreError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.store))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine(cfg)?;
    validate_store(cfg)?;
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.lookback_days == 0 {
        return Err(ChoreError::ConfigError(
            "[engine].lookback_days must be >= 1 (got 0)".to_string(),
        ));
    }

    // A day or more of slack would make daily one-shot tasks due every run.
    if cfg.engine.qualification_tolerance_hours >= 24 {
        return Err(ChoreError::ConfigError(format!(
            "[engine].qualification_tolerance_hours must be < 24 (got {})",
            cfg.engine.qualification_tolerance_hours
        )));
    }

    Ok(())
}

fn validate_store(cfg: &RawConfigFile) -> Result<()> {
    if cfg.store.data_dir.as_os_str().is_empty() {
        return Err(ChoreError::ConfigError(
            "[store].data_dir must not be empty".to_string(),
        ));
    }

    let prefix = &cfg.store.file_prefix;
    if prefix.contains('/') || prefix.contains('\\') {
        return Err(ChoreError::ConfigError(format!(
            "[store].file_prefix must not contain path separators (got '{prefix}')"
        )));
    }

    Ok(())
}
