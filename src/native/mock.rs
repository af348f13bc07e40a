// src/native/mock.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::{DirwatchError, Result, StartError};
use crate::native::{BoxFuture, Mailbox, NativeMessage, NativeWatcher};
use crate::types::{HandleId, WatchPid};

/// A call made against the mock, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Start(HandleId, PathBuf),
    Subscribe(HandleId),
    Stop(WatchPid),
}

#[derive(Debug)]
struct MockWatch {
    handle: HandleId,
    directory: PathBuf,
    mailbox: Option<Mailbox>,
}

#[derive(Debug, Default)]
struct MockState {
    next_pid: u64,
    failures: HashMap<PathBuf, String>,
    subscribe_failures: HashMap<PathBuf, String>,
    delays: HashMap<PathBuf, Duration>,
    active: HashMap<WatchPid, MockWatch>,
    calls: Vec<MockCall>,
}

/// In-memory watch backend.
///
/// Directories start successfully unless told otherwise with
/// [`MockWatcher::fail_on`]. Notifications are injected with
/// [`MockWatcher::emit`].
#[derive(Debug, Clone, Default)]
pub struct MockWatcher {
    state: Arc<Mutex<MockState>>,
}

impl MockWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start` fail for `directory` with the given diagnostic.
    pub fn fail_on(&self, directory: impl AsRef<Path>, reason: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .insert(directory.as_ref().to_path_buf(), reason.into());
    }

    /// Let `start` succeed for `directory` but make its `subscribe` fail.
    pub fn fail_subscribe_on(&self, directory: impl AsRef<Path>, reason: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .subscribe_failures
            .insert(directory.as_ref().to_path_buf(), reason.into());
    }

    /// Make `start` for `directory` take `delay` before answering.
    pub fn delay_on(&self, directory: impl AsRef<Path>, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        state.delays.insert(directory.as_ref().to_path_buf(), delay);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn started(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Start(_, dir) => Some(dir),
                _ => None,
            })
            .collect()
    }

    pub fn subscribed(&self) -> Vec<HandleId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Subscribe(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> Vec<WatchPid> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Stop(pid) => Some(pid),
                _ => None,
            })
            .collect()
    }

    /// Directories with a live watch.
    pub fn active_directories(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap();
        let mut dirs: Vec<_> = state.active.values().map(|w| w.directory.clone()).collect();
        dirs.sort();
        dirs
    }

    pub fn is_active(&self, directory: impl AsRef<Path>) -> bool {
        let state = self.state.lock().unwrap();
        state
            .active
            .values()
            .any(|w| w.directory == directory.as_ref())
    }

    /// Deliver a notification from the watch on `directory`.
    ///
    /// Returns `false` when there is no subscribed watch for it or the
    /// session has gone away.
    pub fn emit<I, E>(&self, directory: impl AsRef<Path>, path: impl AsRef<Path>, events: I) -> bool
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        let state = self.state.lock().unwrap();
        let Some(watch) = state
            .active
            .values()
            .find(|w| w.directory == directory.as_ref())
        else {
            return false;
        };
        match watch.mailbox {
            Some(ref tx) => tx
                .send(NativeMessage::file_event(watch.handle.clone(), path, events))
                .is_ok(),
            None => false,
        }
    }

    /// Deliver an arbitrary message through the watch on `directory`.
    pub fn emit_raw(&self, directory: impl AsRef<Path>, message: NativeMessage) -> bool {
        let state = self.state.lock().unwrap();
        state
            .active
            .values()
            .find(|w| w.directory == directory.as_ref())
            .and_then(|w| w.mailbox.as_ref())
            .is_some_and(|tx| tx.send(message).is_ok())
    }
}

impl NativeWatcher for MockWatcher {
    fn start(
        &self,
        handle: HandleId,
        directory: PathBuf,
    ) -> BoxFuture<'_, std::result::Result<WatchPid, StartError>> {
        Box::pin(async move {
            let delay = {
                let mut state = self.state.lock().unwrap();
                state
                    .calls
                    .push(MockCall::Start(handle.clone(), directory.clone()));
                state.delays.get(&directory).copied()
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            if let Some(reason) = state.failures.get(&directory) {
                return Err(StartError::new(handle, directory, reason.clone()));
            }
            if state.active.values().any(|w| w.handle == handle) {
                return Err(StartError::new(handle, directory, "handle already in use"));
            }

            state.next_pid += 1;
            let pid = WatchPid(state.next_pid);
            state.active.insert(
                pid,
                MockWatch {
                    handle,
                    directory,
                    mailbox: None,
                },
            );
            Ok(pid)
        })
    }

    fn subscribe(&self, handle: &HandleId, mailbox: Mailbox) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let state = &mut *state;
        state.calls.push(MockCall::Subscribe(handle.clone()));
        let watch = state
            .active
            .values_mut()
            .find(|w| &w.handle == handle)
            .ok_or_else(|| DirwatchError::Subscribe {
                handle: handle.clone(),
                reason: "no started watch for this handle".to_string(),
            })?;
        if let Some(reason) = state.subscribe_failures.get(&watch.directory) {
            return Err(DirwatchError::Subscribe {
                handle: handle.clone(),
                reason: reason.clone(),
            });
        }
        watch.mailbox = Some(mailbox);
        Ok(())
    }

    fn stop(&self, pid: WatchPid) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Stop(pid));
        state.active.remove(&pid);
    }
}
