// src/native/mod.rs

//! Binding to the per-directory native watch facility.
//!
//! The engine never talks to `notify` directly. It goes through the
//! [`NativeWatcher`] trait, which exposes exactly what the startup
//! orchestrator needs:
//!
//! - `start` a watch on one directory, identified by a [`HandleId`],
//! - `subscribe` a session mailbox to that handle's notifications,
//! - `stop` a watch by the [`WatchPid`] returned from `start`.
//!
//! [`NotifyBackend`] is the production implementation; [`mock::MockWatcher`]
//! is an in-memory one for tests.
//!
//! Notifications travel as [`NativeMessage`] values shaped like
//! `(source_handle, tag, (path_bytes, [event_id, ...]))`. Turning them into
//! typed changes is the correlator's job (`engine::correlator`).

pub mod mock;
pub mod notify_backend;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::{Result, StartError};
use crate::types::{HandleId, WatchPid};

pub use mock::MockWatcher;
pub use notify_backend::NotifyBackend;

/// Tag carried by every notification a watch backend emits.
pub const FILE_EVENT_TAG: &str = "file_event";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Producer side of a session mailbox. Cloned into every native watch.
pub type Mailbox = mpsc::UnboundedSender<NativeMessage>;

/// Raw message as it lands in a session mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeMessage {
    /// `(source, tag, payload)` as emitted by a watch backend.
    Tagged {
        source: HandleId,
        tag: String,
        payload: Payload,
    },
    /// Anything else sent to the session; never reaches the handler.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Path as raw OS bytes plus the native event identifiers.
    Event { path: Vec<u8>, events: Vec<String> },
    /// The native watch behind `source` has ended.
    Stop,
    /// Payload the backend produced but the engine has no decoding for.
    Opaque(String),
}

impl NativeMessage {
    pub fn file_event<I, E>(source: HandleId, path: impl AsRef<Path>, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        NativeMessage::Tagged {
            source,
            tag: FILE_EVENT_TAG.to_string(),
            payload: Payload::Event {
                path: encode_path(path.as_ref()),
                events: events.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn stopped(source: HandleId) -> Self {
        NativeMessage::Tagged {
            source,
            tag: FILE_EVENT_TAG.to_string(),
            payload: Payload::Stop,
        }
    }
}

/// Low-level byte form of a path, as carried in [`Payload::Event`].
#[cfg(unix)]
pub fn encode_path(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn encode_path(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// A native per-directory watch facility.
pub trait NativeWatcher: Send + Sync + 'static {
    /// Begin watching `directory` under `handle`.
    ///
    /// Handles must be unique within one backend; a collision is reported
    /// as a [`StartError`].
    fn start(
        &self,
        handle: HandleId,
        directory: PathBuf,
    ) -> BoxFuture<'_, std::result::Result<WatchPid, StartError>>;

    /// Route `handle`'s notifications into `mailbox`.
    ///
    /// Only valid after a successful `start`. Notifications raised before
    /// this call are dropped.
    fn subscribe(&self, handle: &HandleId, mailbox: Mailbox) -> Result<()>;

    /// Terminate a started watch. Unknown pids are ignored.
    fn stop(&self, pid: WatchPid);
}
