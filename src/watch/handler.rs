// src/watch/handler.rs

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::event::{Change, Event};

/// What the session loop should do after a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<S> {
    /// Keep processing with this state.
    Continue(S),
    /// Terminate the session.
    Stop,
}

/// Actor-style handler: consumes a change and the current state, returns
/// the next step.
pub type ActorFn<S> = dyn Fn(Change, S) -> Step<S> + Send + Sync;

/// Shareable handler stored in a [`WatchConfig`](super::WatchConfig).
pub struct ActorHandler<S> {
    inner: Arc<ActorFn<S>>,
}

impl<S> ActorHandler<S> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Change, S) -> Step<S> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(&self, change: Change, state: S) -> Step<S> {
        (self.inner)(change, state)
    }
}

impl<S> Clone for ActorHandler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for ActorHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandler").finish_non_exhaustive()
    }
}

/// Adapt a per-event callback into a unit-state actor handler.
///
/// Each change is split into its events; the callback runs once per event,
/// in order, and the session always continues.
pub fn fan_out<F>(f: F) -> ActorHandler<()>
where
    F: Fn(&Path, &Event) + Send + Sync + 'static,
{
    ActorHandler::new(move |change: Change, ()| {
        for event in &change.events {
            f(&change.path, event);
        }
        Step::Continue(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[test]
    fn fan_out_calls_once_per_event_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = fan_out({
            let seen = Arc::clone(&seen);
            move |path: &Path, event: &Event| {
                seen.lock().unwrap().push((path.to_path_buf(), event.clone()));
            }
        });

        let step = handler.call(
            Change::new("/tmp/f", vec![Event::Created, Event::Closed]),
            (),
        );

        assert_eq!(step, Step::Continue(()));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (PathBuf::from("/tmp/f"), Event::Created),
                (PathBuf::from("/tmp/f"), Event::Closed),
            ]
        );
    }

    #[test]
    fn fan_out_with_no_events_still_continues() {
        let handler = fan_out(|_: &Path, _: &Event| panic!("must not be called"));
        assert_eq!(handler.call(Change::new("/tmp/f", vec![]), ()), Step::Continue(()));
    }
}
