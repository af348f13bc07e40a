// tests/notify_end_to_end.rs

mod common;
use crate::common::init_tracing;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use dirwatch::engine::SessionExit;
use dirwatch::errors::DirwatchError;
use dirwatch::event::Event;
use dirwatch::native::NotifyBackend;
use dirwatch::watch::WatchConfig;
use dirwatch_test_utils::recorder::Recorder;
use dirwatch_test_utils::within;

#[tokio::test]
async fn creating_a_file_reaches_the_simple_handler() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir(&watched).unwrap();

    let backend = Arc::new(NotifyBackend::new());
    let recorder = Recorder::new();

    let session = WatchConfig::new()
        .add_directory(&watched)
        .simple_handler(recorder.callback())
        .start(Arc::clone(&backend))
        .await
        .unwrap();
    assert_eq!(backend.active_watches(), 1);

    fs::write(watched.join("x.txt"), b"hello").unwrap();

    within(
        Duration::from_secs(15),
        recorder.wait_until(|seen| {
            seen.iter()
                .any(|(p, e)| p.ends_with("x.txt") && *e == Event::Created)
        }),
    )
    .await;

    let first_for_file = recorder
        .events()
        .into_iter()
        .find(|(p, _)| p.ends_with("x.txt"))
        .unwrap();
    assert_eq!(first_for_file.1, Event::Created);

    let exit = session.shutdown().await.unwrap();
    assert_eq!(exit, SessionExit::MailboxClosed(()));
    assert_eq!(backend.active_watches(), 0);
}

#[tokio::test]
async fn missing_directory_aborts_startup_and_releases_real_watches() {
    init_tracing();
    let a = tempfile::tempdir().unwrap();
    let c = tempfile::tempdir().unwrap();
    let missing = a.path().join("does-not-exist");

    let backend = Arc::new(NotifyBackend::new());
    let err = WatchConfig::new()
        .add_directory(a.path())
        .add_directory(&missing)
        .add_directory(c.path())
        .simple_handler(|_, _| {})
        .startup_timeout(Duration::from_secs(5))
        .start(Arc::clone(&backend))
        .await
        .unwrap_err();

    match err {
        DirwatchError::StartupFailed(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures.iter().next().unwrap().directory, missing);
        }
        other => panic!("expected StartupFailed, got {other:?}"),
    }
    assert_eq!(backend.active_watches(), 0);
}

#[tokio::test]
async fn file_instead_of_directory_is_refused() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("plain.txt");
    fs::write(&file, b"").unwrap();

    let backend = Arc::new(NotifyBackend::new());
    let err = WatchConfig::new()
        .add_directory(&file)
        .simple_handler(|_, _| {})
        .start(Arc::clone(&backend))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("not a directory"), "{err}");
}
