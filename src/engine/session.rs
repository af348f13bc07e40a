// src/engine/session.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::engine::correlator::{Selected, select};
use crate::errors::{DirwatchError, Result};
use crate::native::{Mailbox, NativeMessage};
use crate::types::HandleId;
use crate::watch::{ActorHandler, Step};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet processing.
    Initial,
    /// Dequeuing and dispatching notifications.
    Ready,
    /// Done; no further messages are processed.
    Terminated,
}

/// How a session loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit<S> {
    /// The handler returned [`Step::Stop`].
    Stopped,
    /// Every producer went away; carries the last state.
    MailboxClosed(S),
}

/// The actor: one mailbox, one handler, state threaded through it.
///
/// The loop processes one message at a time, in arrival order, so the
/// handler never runs concurrently with itself.
pub struct Session<S> {
    state: S,
    mailbox: mpsc::UnboundedReceiver<NativeMessage>,
    handler: ActorHandler<S>,
    phase: watch::Sender<Phase>,
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

impl<S> Session<S> {
    pub fn new(
        state: S,
        mailbox: mpsc::UnboundedReceiver<NativeMessage>,
        handler: ActorHandler<S>,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Initial);
        Self {
            state,
            mailbox,
            handler,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Observe phase transitions from outside the loop.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Main loop.
    ///
    /// - Dequeues raw messages and runs them through the correlator.
    /// - Hands every `Change` to the handler with the current state.
    /// - Ends on `Step::Stop`, on a closed mailbox, or on a malformed
    ///   notification (returned as an error).
    pub async fn run(self) -> Result<SessionExit<S>> {
        let Session {
            mut state,
            mut mailbox,
            handler,
            phase,
        } = self;

        phase.send_replace(Phase::Ready);
        info!("watch session ready");

        let mut processed: u64 = 0;

        let outcome = loop {
            let message = match mailbox.recv().await {
                Some(m) => m,
                None => {
                    info!(processed, "session mailbox closed; exiting");
                    break Ok(SessionExit::MailboxClosed(state));
                }
            };

            trace!(?message, "session received message");

            match select(message) {
                Ok(Selected::Change(change)) => {
                    debug!(path = ?change.path, events = ?change.events, "dispatching change");
                    processed += 1;
                    match handler.call(change, state) {
                        Step::Continue(next) => state = next,
                        Step::Stop => {
                            info!(processed, "handler requested stop");
                            break Ok(SessionExit::Stopped);
                        }
                    }
                }
                Ok(Selected::WatcherStopped(handle)) => {
                    warn!(%handle, "native watch ended");
                }
                Ok(Selected::Ignored) => {
                    trace!("message is not a watch notification; ignored");
                }
                Err(err) => {
                    error!(error = %err, "native notification violates the expected shape");
                    break Err(err);
                }
            }
        };

        mailbox.close();
        phase.send_replace(Phase::Terminated);
        outcome
    }
}

/// Releases every native watch a session owns. Safe to run more than once.
pub(crate) struct Teardown {
    stop: Box<dyn Fn() + Send + Sync>,
    done: AtomicBool,
}

impl Teardown {
    pub(crate) fn new(stop: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            stop: Box::new(stop),
            done: AtomicBool::new(false),
        }
    }

    pub(crate) fn run(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            (self.stop)();
        }
    }
}

/// Runs the teardown when the session task finishes, unwinds, or is
/// aborted.
struct ReleaseOnExit(Arc<Teardown>);

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        self.0.run();
    }
}

/// Handle to a running session, returned by a successful startup.
pub struct SessionHandle<S> {
    directories: Vec<PathBuf>,
    handles: Vec<HandleId>,
    mailbox: Mailbox,
    phase: watch::Receiver<Phase>,
    task: JoinHandle<Result<SessionExit<S>>>,
    teardown: Arc<Teardown>,
}

impl<S> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("directories", &self.directories)
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: Send + 'static> SessionHandle<S> {
    /// Spawn the session loop. Its native watches are released as soon as
    /// the loop ends, whatever the reason.
    pub(crate) fn spawn(
        session: Session<S>,
        mailbox: Mailbox,
        directories: Vec<PathBuf>,
        handles: Vec<HandleId>,
        teardown: Teardown,
    ) -> Self {
        let phase = session.subscribe_phase();
        let teardown = Arc::new(teardown);

        let task = tokio::spawn({
            let teardown = Arc::clone(&teardown);
            async move {
                let _release = ReleaseOnExit(teardown);
                session.run().await
            }
        });

        Self {
            directories,
            handles,
            mailbox,
            phase,
            task,
            teardown,
        }
    }
}

impl<S> SessionHandle<S> {
    /// Directories being watched, in configuration order, without repeats.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn handles(&self) -> &[HandleId] {
        &self.handles
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolve once the loop has ended, without consuming the handle.
    ///
    /// Also resolves when the loop task died before reaching
    /// [`Phase::Terminated`].
    pub async fn ended(&self) {
        let mut phase = self.phase.clone();
        let _ = phase.wait_for(|p| *p == Phase::Terminated).await;
    }

    /// Put a message into the session mailbox behind any queued
    /// notifications.
    pub fn send(&self, message: NativeMessage) -> Result<()> {
        self.mailbox
            .send(message)
            .map_err(|_| DirwatchError::Session("session mailbox is closed".to_string()))
    }

    /// Wait until the loop ends: the handler stops, every native watch
    /// goes away, or a malformed notification arrives.
    pub async fn join(self) -> Result<SessionExit<S>> {
        let SessionHandle { mailbox, task, .. } = self;
        drop(mailbox);
        await_task(task).await
    }

    /// Stop every native watch and wait for the loop to drain its mailbox.
    pub async fn shutdown(self) -> Result<SessionExit<S>> {
        let SessionHandle {
            mailbox,
            task,
            teardown,
            ..
        } = self;
        info!("shutting down watch session");
        teardown.run();
        drop(mailbox);
        await_task(task).await
    }
}

async fn await_task<S>(task: JoinHandle<Result<SessionExit<S>>>) -> Result<SessionExit<S>> {
    match task.await {
        Ok(exit) => exit,
        Err(join_err) => Err(DirwatchError::Session(join_err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Change, Event};
    use std::sync::Mutex;

    fn msg(path: &str, ids: &[&str]) -> NativeMessage {
        NativeMessage::file_event(HandleId::new("t:/w"), path, ids.iter().copied())
    }

    #[tokio::test]
    async fn threads_state_through_handler_until_stop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = ActorHandler::new(|change: Change, seen: Vec<PathBuf>| {
            let mut seen = seen;
            seen.push(change.path);
            if seen.len() == 2 {
                Step::Stop
            } else {
                Step::Continue(seen)
            }
        });
        let session = Session::new(Vec::new(), rx, handler);
        assert_eq!(session.phase(), Phase::Initial);
        let phase = session.subscribe_phase();

        tx.send(msg("/w/1", &["created"])).unwrap();
        tx.send(msg("/w/2", &["modified"])).unwrap();
        tx.send(msg("/w/3", &["deleted"])).unwrap();

        let exit = session.run().await.unwrap();
        assert_eq!(exit, SessionExit::Stopped);
        assert_eq!(*phase.borrow(), Phase::Terminated);

        // The third message was never processed and the mailbox is closed.
        assert!(tx.send(msg("/w/4", &["created"])).is_err());
    }

    #[tokio::test]
    async fn closed_mailbox_returns_last_state() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = ActorHandler::new(|change: Change, count: usize| {
            Step::Continue(count + change.events.len())
        });

        tx.send(msg("/w/a", &["created", "closed"])).unwrap();
        tx.send(NativeMessage::Other("noise".to_string())).unwrap();
        tx.send(NativeMessage::stopped(HandleId::new("t:/w"))).unwrap();
        tx.send(msg("/w/b", &["modified"])).unwrap();
        drop(tx);

        let exit = Session::new(0usize, rx, handler).run().await.unwrap();
        assert_eq!(exit, SessionExit::MailboxClosed(3));
    }

    #[tokio::test]
    async fn malformed_notification_ends_the_session_with_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(0));
        let handler = ActorHandler::new({
            let calls = Arc::clone(&calls);
            move |_: Change, ()| {
                *calls.lock().unwrap() += 1;
                Step::Continue(())
            }
        });

        tx.send(NativeMessage::Tagged {
            source: HandleId::new("t:/w"),
            tag: crate::native::FILE_EVENT_TAG.to_string(),
            payload: crate::native::Payload::Opaque("???".to_string()),
        })
        .unwrap();
        tx.send(msg("/w/a", &["created"])).unwrap();

        let result = Session::new((), rx, handler).run().await;
        assert!(matches!(result, Err(DirwatchError::DecodeContractViolation(_))));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_events_reach_the_handler() {
        let (tx, rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = ActorHandler::new({
            let seen = Arc::clone(&seen);
            move |change: Change, ()| {
                seen.lock().unwrap().extend(change.events);
                Step::Continue(())
            }
        });

        tx.send(msg("/w/a", &["undefined"])).unwrap();
        drop(tx);
        Session::new((), rx, handler).run().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Event::Unknown("undefined".to_string())]
        );
    }

    #[test]
    fn teardown_runs_once() {
        let count = Arc::new(Mutex::new(0));
        let teardown = Teardown::new({
            let count = Arc::clone(&count);
            move || *count.lock().unwrap() += 1
        });
        teardown.run();
        teardown.run();
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
