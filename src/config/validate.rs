// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DirwatchError, Result};
use crate::types::HandleId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DirwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.startup_timeout_ms == 0 {
        return Err(DirwatchError::ConfigError(
            "[watch].startup_timeout_ms must be > 0".to_string(),
        ));
    }

    if let Err(rule) = HandleId::check_prefix(&cfg.watch.handle_prefix) {
        return Err(DirwatchError::ConfigError(format!(
            "[watch].handle_prefix {rule}"
        )));
    }

    if let Some(empty) = cfg
        .watch
        .directories
        .iter()
        .position(|d| d.as_os_str().is_empty())
    {
        return Err(DirwatchError::ConfigError(format!(
            "[watch].directories[{empty}] is an empty path"
        )));
    }

    Ok(())
}

/// Validate an already-built [`ConfigFile`] once command-line directories
/// have been merged in.
pub fn ensure_has_directories(cfg: &ConfigFile) -> Result<()> {
    if cfg.watch.directories.is_empty() {
        return Err(DirwatchError::ConfigError(
            "no directories to watch (use --dir or [watch].directories)".to_string(),
        ));
    }
    Ok(())
}
