// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event;
pub mod logging;
pub mod native;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::config::validate::ensure_has_directories;
use crate::config::{default_config_path, load_and_validate};
use crate::engine::SessionExit;
use crate::native::NotifyBackend;

pub use crate::engine::{SessionHandle, start_session};
pub use crate::event::{Change, Event, normalize};
pub use crate::watch::{Step, WatchConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + `--dir` flags)
/// - the notify-backed native watcher
/// - a session printing one `<event> <path>` line per event
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    ensure_has_directories(&cfg)?;

    let backend = Arc::new(NotifyBackend::new());
    let session = cfg
        .to_watch_config::<()>()
        .simple_handler(|path: &Path, event: &Event| {
            println!("{event} {}", path.display());
        })
        .start(backend)
        .await?;

    info!(directories = ?session.directories(), "watching; press Ctrl-C to stop");

    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl-C received");
            session.shutdown().await?
        }
        _ = session.ended() => {
            warn!("watch session ended on its own");
            session.join().await?
        }
    };

    match exit {
        SessionExit::Stopped => debug!("session stopped by handler"),
        SessionExit::MailboxClosed(()) => debug!("session mailbox drained"),
    }
    Ok(())
}

/// Merge the config file (explicit, or `Dirwatch.toml` when present) with
/// command-line overrides.
fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let base = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => {
            let default_path = default_config_path();
            if default_path.is_file() {
                debug!(path = ?default_path, "using default config file");
                load_and_validate(&default_path)?
            } else {
                ConfigFile::try_from(config::RawConfigFile::default())?
            }
        }
    };

    let mut cfg = base.with_extra_directories(args.dirs.iter().cloned());
    if let Some(ms) = args.startup_timeout_ms {
        if ms == 0 {
            anyhow::bail!("--startup-timeout-ms must be > 0");
        }
        cfg.watch.startup_timeout_ms = ms;
    }
    Ok(cfg)
}

/// Simple dry-run output: print what would be watched.
fn print_dry_run(cfg: &ConfigFile) {
    println!("dirwatch dry-run");
    println!(
        "  startup_timeout = {:?}",
        Duration::from_millis(cfg.watch.startup_timeout_ms)
    );
    println!("  handle_prefix = {}", cfg.watch.handle_prefix);
    println!();

    println!("directories ({}):", cfg.watch.directories.len());
    for dir in &cfg.watch.directories {
        println!(
            "  - {}  [{}]",
            dir.display(),
            types::HandleId::derive(&cfg.watch.handle_prefix, dir)
        );
    }

    debug!("dry-run complete (nothing watched)");
}
