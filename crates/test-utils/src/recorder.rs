use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use dirwatch::event::Event;

/// Collects `(path, event)` pairs delivered to a simple handler.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<(PathBuf, Event)>>>,
    notify: Arc<Notify>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback suitable for `WatchConfig::simple_handler`.
    pub fn callback(&self) -> impl Fn(&Path, &Event) + Send + Sync + use<> {
        let recorder = self.clone();
        move |path: &Path, event: &Event| recorder.record(path, event)
    }

    pub fn record(&self, path: &Path, event: &Event) {
        self.seen
            .lock()
            .unwrap()
            .push((path.to_path_buf(), event.clone()));
        self.notify.notify_waiters();
    }

    pub fn events(&self) -> Vec<(PathBuf, Event)> {
        self.seen.lock().unwrap().clone()
    }

    /// Wait until `pred` holds over the recorded events.
    pub async fn wait_until<F>(&self, pred: F)
    where
        F: Fn(&[(PathBuf, Event)]) -> bool,
    {
        loop {
            let notified = self.notify.notified();
            if pred(&self.seen.lock().unwrap()) {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for_count(&self, n: usize) {
        self.wait_until(|seen| seen.len() >= n).await;
    }
}
