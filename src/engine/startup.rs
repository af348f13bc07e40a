// src/engine/startup.rs

//! All-or-nothing session startup.
//!
//! 1. Derive one handle per directory.
//! 2. Ask the backend to start every watch concurrently and wait for all
//!    of them, successes and failures alike.
//! 3. If everything started, subscribe each watch to a fresh mailbox and
//!    spawn the session loop.
//! 4. Otherwise stop every watch that did start and report all failures.
//!
//! The whole sequence runs under the configured startup timeout. Watches
//! that finish starting after the deadline are stopped as they arrive.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::engine::session::{Session, SessionHandle, Teardown};
use crate::errors::{DirwatchError, Result, StartError, StartFailures};
use crate::native::NativeWatcher;
use crate::types::{HandleId, WatchPid};
use crate::watch::WatchConfig;
use crate::watch::builder::Runnable;

type StartResult = std::result::Result<WatchPid, StartError>;

/// Start watching every directory in `config` and spawn its session.
///
/// Either every directory ends up watched and a [`SessionHandle`] is
/// returned, or none is and the error describes every failure.
pub async fn start_session<S, B>(config: WatchConfig<S>, backend: Arc<B>) -> Result<SessionHandle<S>>
where
    S: Send + 'static,
    B: NativeWatcher + ?Sized,
{
    let Runnable {
        directories,
        handler,
        state,
        startup_timeout,
        handle_prefix,
    } = config.into_runnable()?;

    let plan = plan_handles(&handle_prefix, &directories)?;
    info!(directories = plan.len(), "starting native watches");

    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, StartResult)>();
    for (index, (handle, directory)) in plan.iter().cloned().enumerate() {
        let backend = Arc::clone(&backend);
        let result_tx = result_tx.clone();
        tokio::spawn(async move {
            let result = backend.start(handle, directory).await;
            let _ = result_tx.send((index, result));
        });
    }
    drop(result_tx);

    let mut results: Vec<Option<StartResult>> = vec![None; plan.len()];
    let collected = timeout(startup_timeout, async {
        let mut pending = plan.len();
        while pending > 0 {
            match result_rx.recv().await {
                Some((index, result)) => {
                    results[index] = Some(result);
                    pending -= 1;
                }
                // A start task died without reporting.
                None => break,
            }
        }
    })
    .await;

    if collected.is_err() {
        let started: Vec<WatchPid> = results
            .iter()
            .flatten()
            .filter_map(|r| r.as_ref().ok().copied())
            .collect();
        error!(
            timeout = ?startup_timeout,
            started = started.len(),
            "startup timed out; rolling back"
        );
        for pid in started {
            backend.stop(pid);
        }
        stop_late_arrivals(Arc::clone(&backend), result_rx);
        return Err(DirwatchError::StartupTimeout(startup_timeout));
    }

    let mut oks: Vec<(HandleId, PathBuf, WatchPid)> = Vec::new();
    let mut errs: Vec<StartError> = Vec::new();
    for ((handle, directory), result) in plan.into_iter().zip(results) {
        match result {
            Some(Ok(pid)) => oks.push((handle, directory, pid)),
            Some(Err(err)) => errs.push(err),
            None => errs.push(StartError::new(
                handle,
                directory,
                "start task ended without reporting",
            )),
        }
    }

    if !errs.is_empty() {
        for err in &errs {
            warn!(handle = %err.handle, directory = ?err.directory, reason = %err.reason, "watch failed to start");
        }
        rollback(backend.as_ref(), &oks);
        return Err(DirwatchError::StartupFailed(StartFailures(errs)));
    }

    let (mailbox, inbox) = mpsc::unbounded_channel();
    for (handle, _, _) in &oks {
        if let Err(err) = backend.subscribe(handle, mailbox.clone()) {
            error!(%handle, error = %err, "subscribe failed; rolling back");
            rollback(backend.as_ref(), &oks);
            return Err(err);
        }
    }

    let directories: Vec<PathBuf> = oks.iter().map(|(_, d, _)| d.clone()).collect();
    let handles: Vec<HandleId> = oks.iter().map(|(h, _, _)| h.clone()).collect();
    let pids: Vec<WatchPid> = oks.iter().map(|(_, _, p)| *p).collect();

    let teardown = Teardown::new({
        let backend = Arc::clone(&backend);
        move || {
            for pid in &pids {
                backend.stop(*pid);
            }
        }
    });

    info!(?directories, "all watches started; session ready");

    let session = Session::new(state, inbox, handler);
    Ok(SessionHandle::spawn(session, mailbox, directories, handles, teardown))
}

/// Derive handle ids, keeping the configured order.
///
/// A directory listed more than once is watched once. Two different
/// directories that derive the same id are rejected.
fn plan_handles(prefix: &str, directories: &[PathBuf]) -> Result<Vec<(HandleId, PathBuf)>> {
    let mut seen: HashMap<HandleId, &PathBuf> = HashMap::new();
    let mut plan = Vec::with_capacity(directories.len());

    for directory in directories {
        let handle = HandleId::derive(prefix, directory);
        match seen.get(&handle) {
            Some(existing) if *existing == directory => {
                warn!(%handle, directory = ?directory, "directory listed more than once; watching it once");
            }
            Some(existing) => {
                return Err(DirwatchError::ConfigError(format!(
                    "directories {existing:?} and {directory:?} both map to watch handle {handle}"
                )));
            }
            None => {
                seen.insert(handle.clone(), directory);
                plan.push((handle, directory.clone()));
            }
        }
    }

    Ok(plan)
}

fn rollback<B>(backend: &B, oks: &[(HandleId, PathBuf, WatchPid)])
where
    B: NativeWatcher + ?Sized,
{
    for (handle, directory, pid) in oks {
        debug!(%handle, %pid, directory = ?directory, "rolling back started watch");
        backend.stop(*pid);
    }
}

/// Keep draining start results after a timeout so nothing stays running.
fn stop_late_arrivals<B>(backend: Arc<B>, mut results: mpsc::UnboundedReceiver<(usize, StartResult)>)
where
    B: NativeWatcher + ?Sized,
{
    tokio::spawn(async move {
        while let Some((_, result)) = results.recv().await {
            if let Ok(pid) = result {
                warn!(%pid, "watch started after the startup deadline; stopping it");
                backend.stop(pid);
            }
        }
    });
}
