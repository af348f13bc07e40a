// src/watch/builder.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{SessionHandle, start_session};
use crate::errors::{DirwatchError, Result};
use crate::event::{Change, Event};
use crate::native::NativeWatcher;
use crate::types::{DEFAULT_HANDLE_PREFIX, DEFAULT_STARTUP_TIMEOUT, HandleId};
use crate::watch::handler::{ActorHandler, Step, fan_out};

/// Everything needed to start a watch session.
///
/// Every setter consumes the configuration and returns a new one; clone
/// first to branch off variants. Directories keep the order they were
/// added in, duplicates included.
///
/// ```no_run
/// # async fn demo() -> dirwatch::errors::Result<()> {
/// use std::sync::Arc;
/// use dirwatch::native::NotifyBackend;
/// use dirwatch::watch::WatchConfig;
///
/// let session = WatchConfig::new()
///     .add_directory("./watched")
///     .simple_handler(|path, event| println!("{event} {}", path.display()))
///     .start(Arc::new(NotifyBackend::new()))
///     .await?;
/// session.join().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WatchConfig<S> {
    directories: Vec<PathBuf>,
    handler: Option<ActorHandler<S>>,
    initial_state: Option<S>,
    startup_timeout: Duration,
    handle_prefix: String,
}

/// A configuration that passed the runnable check.
#[derive(Debug)]
pub(crate) struct Runnable<S> {
    pub directories: Vec<PathBuf>,
    pub handler: ActorHandler<S>,
    pub state: S,
    pub startup_timeout: Duration,
    pub handle_prefix: String,
}

impl<S> Default for WatchConfig<S> {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            handler: None,
            initial_state: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            handle_prefix: DEFAULT_HANDLE_PREFIX.to_string(),
        }
    }
}

impl<S> WatchConfig<S> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directories.push(directory.into());
        self
    }

    #[must_use]
    pub fn add_directories<I, P>(self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        directories
            .into_iter()
            .fold(self, |cfg, dir| cfg.add_directory(dir))
    }

    /// Set the actor-style handler. Replaces any earlier handler.
    #[must_use]
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(Change, S) -> Step<S> + Send + Sync + 'static,
    {
        self.handler = Some(ActorHandler::new(f));
        self
    }

    #[must_use]
    pub fn initial_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set handler and initial state together.
    #[must_use]
    pub fn actor<F>(self, f: F, state: S) -> Self
    where
        F: Fn(Change, S) -> Step<S> + Send + Sync + 'static,
    {
        self.handler(f).initial_state(state)
    }

    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Prefix used when deriving per-directory handle ids.
    #[must_use]
    pub fn handle_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.handle_prefix = prefix.into();
        self
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn has_initial_state(&self) -> bool {
        self.initial_state.is_some()
    }

    /// Both a handler and an initial state are present.
    pub fn is_runnable(&self) -> bool {
        self.has_handler() && self.has_initial_state()
    }

    pub fn get_startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    pub fn get_handle_prefix(&self) -> &str {
        &self.handle_prefix
    }

    pub(crate) fn into_runnable(self) -> Result<Runnable<S>> {
        if let Err(rule) = HandleId::check_prefix(&self.handle_prefix) {
            return Err(DirwatchError::ConfigError(format!(
                "handle prefix {:?} {rule}",
                self.handle_prefix
            )));
        }

        let (handler, state) = match (self.handler, self.initial_state) {
            (Some(h), Some(s)) => (h, s),
            (None, Some(_)) => {
                return Err(DirwatchError::ConfigError(
                    "no handler set; call `handler` or `simple_handler` before starting".into(),
                ));
            }
            (Some(_), None) => {
                return Err(DirwatchError::ConfigError(
                    "no initial state set; call `initial_state` before starting".into(),
                ));
            }
            (None, None) => {
                return Err(DirwatchError::ConfigError(
                    "neither handler nor initial state set".into(),
                ));
            }
        };

        Ok(Runnable {
            directories: self.directories,
            handler,
            state,
            startup_timeout: self.startup_timeout,
            handle_prefix: self.handle_prefix,
        })
    }
}

impl<S: Send + 'static> WatchConfig<S> {
    /// Start watching every configured directory.
    pub async fn start<B>(self, backend: Arc<B>) -> Result<SessionHandle<S>>
    where
        B: NativeWatcher + ?Sized,
    {
        start_session(self, backend).await
    }
}

impl WatchConfig<()> {
    /// Use a per-event callback with unit state.
    ///
    /// Sets both handler and initial state, replacing any actor handler set
    /// before.
    #[must_use]
    pub fn simple_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &Event) + Send + Sync + 'static,
    {
        self.handler = Some(fan_out(f));
        self.initial_state = Some(());
        self
    }
}
