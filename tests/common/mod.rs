#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dirwatch::native::MockWatcher;
use dirwatch::watch::WatchConfig;
use dirwatch_test_utils::recorder::Recorder;

pub use dirwatch_test_utils::{init_tracing, with_timeout};

/// Fixed fake directories; the mock never touches the filesystem.
pub fn dirs(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from(format!("/mock/{n}"))).collect()
}

/// A unit-state configuration recording every event it sees.
pub fn recording_config(directories: &[PathBuf], recorder: &Recorder) -> WatchConfig<()> {
    WatchConfig::new()
        .add_directories(directories.iter().cloned())
        .simple_handler(recorder.callback())
        .startup_timeout(Duration::from_secs(2))
}

pub fn mock() -> Arc<MockWatcher> {
    Arc::new(MockWatcher::new())
}
