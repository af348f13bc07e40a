// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{DEFAULT_HANDLE_PREFIX, DEFAULT_STARTUP_TIMEOUT};
use crate::watch::WatchConfig;

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// directories = ["./src", "./assets"]
/// startup_timeout_ms = 5000
/// handle_prefix = "dirwatch"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Directories to watch, in order.
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// Upper bound for starting every watch, in milliseconds.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Prefix for per-directory handle ids.
    #[serde(default = "default_handle_prefix")]
    pub handle_prefix: String,
}

fn default_startup_timeout_ms() -> u64 {
    DEFAULT_STARTUP_TIMEOUT.as_millis() as u64
}

fn default_handle_prefix() -> String {
    DEFAULT_HANDLE_PREFIX.to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            startup_timeout_ms: default_startup_timeout_ms(),
            handle_prefix: default_handle_prefix(),
        }
    }
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection) -> Self {
        Self { watch }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.watch.startup_timeout_ms)
    }

    /// Append more directories after the ones from the file.
    pub fn with_extra_directories(mut self, extra: impl IntoIterator<Item = PathBuf>) -> Self {
        self.watch.directories.extend(extra);
        self
    }

    /// Seed a [`WatchConfig`] with directories, timeout and prefix.
    ///
    /// The handler and initial state still have to be set by the caller.
    pub fn to_watch_config<S>(&self) -> WatchConfig<S> {
        WatchConfig::new()
            .add_directories(self.watch.directories.iter().cloned())
            .startup_timeout(self.startup_timeout())
            .handle_prefix(self.watch.handle_prefix.clone())
    }
}
