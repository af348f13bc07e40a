// src/errors.rs

//! Crate-wide error type and result alias.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::HandleId;

/// A single directory the native facility refused to watch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot watch {directory:?} ({handle}): {reason}")]
pub struct StartError {
    pub handle: HandleId,
    pub directory: PathBuf,
    pub reason: String,
}

impl StartError {
    pub fn new(handle: HandleId, directory: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            handle,
            directory: directory.into(),
            reason: reason.into(),
        }
    }
}

/// Every per-directory failure from one startup attempt, in directory order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartFailures(pub Vec<StartError>);

impl StartFailures {
    pub fn iter(&self) -> impl Iterator<Item = &StartError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StartFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} director", self.0.len())?;
        f.write_str(if self.0.len() == 1 { "y" } else { "ies" })?;
        f.write_str(" could not be watched")?;
        for (i, err) in self.0.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum DirwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Startup failed, {0}")]
    StartupFailed(StartFailures),

    #[error("Startup did not complete within {0:?}")]
    StartupTimeout(Duration),

    #[error("Cannot subscribe to {handle}: {reason}")]
    Subscribe { handle: HandleId, reason: String },

    #[error("Malformed native notification: {0}")]
    DecodeContractViolation(String),

    #[error("Session task failed: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DirwatchError>;
