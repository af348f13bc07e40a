// src/native/notify_backend.rs

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace, warn};

use crate::errors::{DirwatchError, Result, StartError};
use crate::native::{BoxFuture, Mailbox, NativeMessage, NativeWatcher};
use crate::types::{HandleId, WatchPid};

/// Subscriber slot shared between a watch entry and its notify callback.
type Subscriber = Arc<Mutex<Option<Mailbox>>>;

/// Native watch backend built on `notify::RecommendedWatcher`.
///
/// Each started directory gets its own watcher, watched non-recursively.
/// Cloning the backend shares the same set of watches.
#[derive(Clone, Default)]
pub struct NotifyBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_pid: AtomicU64,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    handles: HashMap<HandleId, WatchPid>,
    watches: HashMap<WatchPid, Entry>,
}

struct Entry {
    handle: HandleId,
    directory: PathBuf,
    subscriber: Subscriber,
    // Dropping the watcher stops the OS-level watch.
    _watcher: RecommendedWatcher,
}

impl fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("active_watches", &self.active_watches())
            .finish()
    }
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of native watches currently alive.
    pub fn active_watches(&self) -> usize {
        self.inner.lock().watches.len()
    }

    /// Directories currently being watched, in no particular order.
    pub fn watched_directories(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .watches
            .values()
            .map(|e| e.directory.clone())
            .collect()
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `handle` and allocate a pid for it.
    fn reserve(&self, handle: &HandleId) -> Option<WatchPid> {
        let mut state = self.lock();
        if state.handles.contains_key(handle) {
            return None;
        }
        let pid = WatchPid(self.next_pid.fetch_add(1, Ordering::Relaxed) + 1);
        state.handles.insert(handle.clone(), pid);
        Some(pid)
    }

    fn release(&self, handle: &HandleId) {
        self.lock().handles.remove(handle);
    }
}

impl NativeWatcher for NotifyBackend {
    fn start(
        &self,
        handle: HandleId,
        directory: PathBuf,
    ) -> BoxFuture<'_, std::result::Result<WatchPid, StartError>> {
        Box::pin(async move {
            let pid = self.inner.reserve(&handle).ok_or_else(|| {
                StartError::new(handle.clone(), &directory, "handle already in use")
            })?;

            let subscriber: Subscriber = Arc::new(Mutex::new(None));

            // Watcher setup touches the OS; keep it off the async workers.
            let built = tokio::task::spawn_blocking({
                let handle = handle.clone();
                let directory = directory.clone();
                let subscriber = Arc::clone(&subscriber);
                move || build_watcher(&handle, &directory, subscriber)
            })
            .await;

            let watcher = match built {
                Ok(Ok(w)) => w,
                Ok(Err(reason)) => {
                    self.inner.release(&handle);
                    return Err(StartError::new(handle, directory, reason));
                }
                Err(join_err) => {
                    self.inner.release(&handle);
                    return Err(StartError::new(
                        handle,
                        directory,
                        format!("watch setup task failed: {join_err}"),
                    ));
                }
            };

            info!(%handle, %pid, directory = ?directory, "native watch started");

            self.inner.lock().watches.insert(
                pid,
                Entry {
                    handle,
                    directory,
                    subscriber,
                    _watcher: watcher,
                },
            );

            Ok(pid)
        })
    }

    fn subscribe(&self, handle: &HandleId, mailbox: Mailbox) -> Result<()> {
        let state = self.inner.lock();
        let entry = state
            .handles
            .get(handle)
            .and_then(|pid| state.watches.get(pid))
            .ok_or_else(|| DirwatchError::Subscribe {
                handle: handle.clone(),
                reason: "no started watch for this handle".to_string(),
            })?;

        *entry
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(mailbox);

        debug!(%handle, "session subscribed");
        Ok(())
    }

    fn stop(&self, pid: WatchPid) {
        let entry = {
            let mut state = self.inner.lock();
            let entry = state.watches.remove(&pid);
            if let Some(ref e) = entry {
                state.handles.remove(&e.handle);
            }
            entry
        };

        match entry {
            Some(entry) => {
                entry
                    .subscriber
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                info!(handle = %entry.handle, %pid, "native watch stopped");
                // `entry` (and the watcher) dropped here, outside the lock.
            }
            None => trace!(%pid, "stop for unknown watch ignored"),
        }
    }
}

fn build_watcher(
    handle: &HandleId,
    directory: &Path,
    subscriber: Subscriber,
) -> std::result::Result<RecommendedWatcher, String> {
    if !directory.is_dir() {
        return Err(if directory.exists() {
            "not a directory".to_string()
        } else {
            "no such directory".to_string()
        });
    }

    let source = handle.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => forward(&source, &subscriber, event),
            Err(err) => warn!(handle = %source, error = %err, "native watch error"),
        },
        Config::default(),
    )
    .map_err(|e| e.to_string())?;

    watcher
        .watch(directory, RecursiveMode::NonRecursive)
        .map_err(|e| e.to_string())?;

    Ok(watcher)
}

/// Push one notify event into the subscribed mailbox, one message per path.
fn forward(source: &HandleId, subscriber: &Subscriber, event: notify::Event) {
    let guard = subscriber.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(mailbox) = guard.as_ref() else {
        trace!(handle = %source, "notification before subscribe dropped");
        return;
    };

    let id = native_identifier(&event.kind);
    for path in event.paths {
        if mailbox
            .send(NativeMessage::file_event(source.clone(), &path, [id]))
            .is_err()
        {
            trace!(handle = %source, "session mailbox closed");
            return;
        }
    }
}

/// Native identifier for a notify event kind, as fed to `event::normalize`.
pub fn native_identifier(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Create(_) => "created",
        EventKind::Remove(_) => "removed",
        EventKind::Modify(ModifyKind::Name(_)) => "renamed",
        EventKind::Modify(ModifyKind::Metadata(_)) => "attribute",
        EventKind::Modify(_) => "modified",
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => "closed",
        EventKind::Access(AccessKind::Open(_)) => "opened",
        EventKind::Access(_) => "accessed",
        EventKind::Any | EventKind::Other => "undefined",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, normalize};
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    #[test]
    fn notify_kinds_normalize_to_expected_events() {
        let cases = [
            (EventKind::Create(CreateKind::File), Event::Created),
            (EventKind::Remove(RemoveKind::Any), Event::Deleted),
            (EventKind::Modify(ModifyKind::Data(DataChange::Content)), Event::Modified),
            (EventKind::Modify(ModifyKind::Name(RenameMode::Both)), Event::Renamed),
            (EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)), Event::Attribute),
            (EventKind::Access(AccessKind::Close(AccessMode::Write)), Event::Closed),
        ];
        for (kind, expected) in cases {
            assert_eq!(normalize(native_identifier(&kind)), expected, "{kind:?}");
        }
    }

    #[test]
    fn unmapped_kinds_surface_as_unknown() {
        assert_eq!(
            normalize(native_identifier(&EventKind::Access(AccessKind::Read))),
            Event::Unknown("accessed".to_string())
        );
        assert!(normalize(native_identifier(&EventKind::Other)).is_unknown());
    }

    #[tokio::test]
    async fn missing_directory_fails_to_start() {
        let backend = NotifyBackend::new();
        let dir = PathBuf::from("/definitely/not/here/dirwatch");
        let err = backend
            .start(HandleId::derive("t", &dir), dir.clone())
            .await
            .unwrap_err();
        assert_eq!(err.directory, dir);
        assert_eq!(err.reason, "no such directory");
        assert_eq!(backend.active_watches(), 0);
    }

    #[tokio::test]
    async fn start_then_stop_releases_watch_and_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = NotifyBackend::new();
        let handle = HandleId::derive("t", tmp.path());

        let pid = backend
            .start(handle.clone(), tmp.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(backend.active_watches(), 1);

        // Same handle cannot be started twice.
        let dup = backend.start(handle.clone(), tmp.path().to_path_buf()).await;
        assert!(dup.is_err());

        backend.stop(pid);
        backend.stop(pid);
        assert_eq!(backend.active_watches(), 0);

        // Handle is free again after stop.
        let pid2 = backend.start(handle, tmp.path().to_path_buf()).await.unwrap();
        backend.stop(pid2);
    }

    #[test]
    fn subscribe_requires_started_handle() {
        let backend = NotifyBackend::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = backend
            .subscribe(&HandleId::new("t:/nowhere"), tx)
            .unwrap_err();
        assert!(matches!(err, DirwatchError::Subscribe { .. }));
    }
}
