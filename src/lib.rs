// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod lock;
pub mod logging;
pub mod types;
pub mod watch;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_daemon_config;
use crate::config::{DaemonConfig, DaemonSettings};
use crate::engine::{DebounceScheduler, ReconnectLoop};
use crate::errors::RebuildError;
use crate::exec::{DesktopNotifier, RebuildExecutor};
use crate::lock::{InstanceGuard, InstancePolicy, RebuildLock};
use crate::watch::{NotifyWatchClient, WatchFilter};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config path resolution and ignore-config loading
/// - the instance guard and rebuild lock
/// - executor, debounce scheduler and reconnect loop
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = DaemonSettings::default().with_state_dir(&args.state_dir);

    wait_for_config_path(&args.config_path).await;
    let config = load_daemon_config(&args.config_path, args.command.clone())?;

    if args.dry_run {
        print_dry_run(&config, &settings);
        return Ok(());
    }

    run_daemon(config, settings).await?;
    Ok(())
}

/// Run the daemon until interrupted or until the watch service cannot be
/// reached any more.
pub async fn run_daemon(config: DaemonConfig, settings: DaemonSettings) -> errors::Result<()> {
    info!("starting watchman-rebuild");
    info!(path = %config.config_path.display(), "watching");
    info!(cmd = %config.command, source = %config.command.source, "rebuild command");
    if !config.ignore_patterns.is_empty() {
        info!(patterns = ?config.ignore_patterns, "ignore patterns");
    }

    let guard =
        InstanceGuard::acquire(settings.instance_file(), InstancePolicy::from(&settings)).await?;

    let lock = RebuildLock::new(settings.lock_file());
    lock.clear_stale()?;

    let filter = WatchFilter::from_patterns(&config.ignore_patterns)
        .map_err(|err| RebuildError::ConfigError(format!("{err:#}")))?;

    let executor = Arc::new(RebuildExecutor::new(
        &config.config_path,
        config.command.clone(),
        lock,
        DesktopNotifier,
    ));
    let scheduler = DebounceScheduler::spawn(settings.debounce_delay, executor);

    let client = NotifyWatchClient::new(settings.receive_timeout);
    let watcher = ReconnectLoop::new(client, &config.config_path, filter, scheduler, &settings);

    // The first signal starts a graceful stop, which waits for a running
    // rebuild. A second one abandons that wait.
    let (first_tx, first_rx) = oneshot::channel();
    let shutdown = async move {
        shutdown_signal().await;
        let _ = first_tx.send(());
    };
    let forced = async move {
        if first_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        info!("stopping; signal again to exit without waiting for the rebuild");
        shutdown_signal().await;
    };

    let outcome = match unless_forced(watcher.run(shutdown), forced).await {
        Some(outcome) => outcome,
        None => {
            warn!("second signal received, exiting without waiting for the rebuild");
            Ok(())
        }
    };

    guard.release();
    outcome
}

/// Drive `daemon` to completion unless `forced` resolves first.
async fn unless_forced<T>(
    daemon: impl Future<Output = T>,
    forced: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        biased;
        outcome = daemon => Some(outcome),
        _ = forced => None,
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// On macOS the config tree may live on a volume that is mounted after the
/// daemon starts; `wait4path` blocks until it appears.
async fn wait_for_config_path(path: &Path) {
    if std::env::consts::OS != "macos" || path.exists() {
        return;
    }

    info!(path = %path.display(), "waiting for config path to become available");
    match tokio::process::Command::new("/bin/wait4path")
        .arg(path)
        .status()
        .await
    {
        Ok(status) if status.success() => debug!(path = %path.display(), "config path available"),
        Ok(status) => warn!(%status, "wait4path exited unsuccessfully"),
        Err(err) => warn!(error = %err, "could not run wait4path"),
    }
}

/// Simple dry-run output: print the resolved command, patterns and markers.
fn print_dry_run(config: &DaemonConfig, settings: &DaemonSettings) {
    println!("watchman-rebuild dry-run");
    println!("  config_path = {}", config.config_path.display());
    println!("  command = {} ({})", config.command, config.command.source);
    println!("  instance_file = {}", settings.instance_file().display());
    println!("  lock_file = {}", settings.lock_file().display());
    println!();

    println!("ignore_patterns ({}):", config.ignore_patterns.len());
    for pattern in &config.ignore_patterns {
        println!("  - {pattern}");
    }

    debug!("dry-run complete (no markers touched, nothing watched)");
}
