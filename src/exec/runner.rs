// src/exec/runner.rs

//! Rebuild subprocess runner.

use std::collections::BTreeSet;
use std::os::fd::AsFd;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::RebuildCommand;
use crate::errors::Result;
use crate::exec::backend::{RebuildTrigger, TriggerFuture};
use crate::exec::notification::Notifier;
use crate::lock::{LockStatus, RebuildLock};
use crate::types::{NotificationKind, RebuildOutcome};

/// Environment override letting the rebuild evaluate unfree packages.
pub const UNFREE_ENV: (&str, &str) = ("NIXPKGS_ALLOW_UNFREE", "1");

/// How many changed paths are listed before summarising the rest.
const SUMMARY_LIMIT: usize = 10;
const SEPARATOR: &str = "============================================================";

/// Runs the rebuild command under the rebuild lock and reports the result.
pub struct RebuildExecutor<N: Notifier> {
    workdir: PathBuf,
    command: RebuildCommand,
    lock: RebuildLock,
    notifier: N,
}

impl<N: Notifier> std::fmt::Debug for RebuildExecutor<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildExecutor")
            .field("workdir", &self.workdir)
            .field("command", &self.command.line)
            .field("lock", &self.lock.path())
            .finish_non_exhaustive()
    }
}

impl<N: Notifier> RebuildExecutor<N> {
    pub fn new(
        workdir: impl Into<PathBuf>,
        command: RebuildCommand,
        lock: RebuildLock,
        notifier: N,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            command,
            lock,
            notifier,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn lock(&self) -> &RebuildLock {
        &self.lock
    }

    /// Run one rebuild attempt.
    ///
    /// - Lock busy: nothing runs and the result is [`RebuildOutcome::Skipped`].
    /// - Otherwise the command runs through `sh -c` in the config root, with
    ///   stdout inherited and stderr joined onto the daemon's stdout.
    ///
    /// The lock is released on every path out of the attempt, including a
    /// failure to launch the command.
    pub async fn run(&self) -> Result<RebuildOutcome> {
        let guard = match self.lock.acquire()? {
            LockStatus::Acquired(guard) => guard,
            LockStatus::Busy => {
                info!("skipping rebuild - another rebuild is in progress");
                return Ok(RebuildOutcome::Skipped);
            }
        };

        info!(cmd = %self.command, source = %self.command.source, "running rebuild");
        let status = self.spawn_and_wait().await;
        guard.release();

        match status {
            Ok(status) if status.success() => {
                info!("✅ rebuild successful");
                self.notify(NotificationKind::Success).await;
                Ok(RebuildOutcome::Succeeded)
            }
            Ok(status) => {
                let exit_code = status.code();
                match (exit_code, status.signal()) {
                    (Some(code), _) => error!(exit_code = code, "❌ rebuild failed"),
                    (None, signal) => error!(?signal, "❌ rebuild terminated by signal"),
                }
                self.notify(NotificationKind::Failure).await;
                Ok(RebuildOutcome::Failed { exit_code })
            }
            Err(err) => {
                error!(cmd = %self.command, error = %err, "failed to launch rebuild command");
                self.notify(NotificationKind::Failure).await;
                Err(err.into())
            }
        }
    }

    async fn spawn_and_wait(&self) -> std::io::Result<ExitStatus> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command.line)
            .current_dir(&self.workdir)
            .env(UNFREE_ENV.0, UNFREE_ENV.1)
            .stdout(Stdio::inherit())
            .stderr(stdout_as_stdio()?);

        // Never killed on drop: an in-flight rebuild outlives shutdown.
        let mut child = cmd.spawn()?;
        debug!(pid = ?child.id(), "rebuild process started");
        child.wait().await
    }

    async fn notify(&self, kind: NotificationKind) {
        // Best effort: delivery failures are reported and dropped here.
        if let Err(err) = self.notifier.send(kind).await {
            debug!(?kind, error = %err, "notification not delivered");
        }
    }
}

impl<N: Notifier> RebuildTrigger for RebuildExecutor<N> {
    fn trigger(&self, paths: BTreeSet<String>) -> TriggerFuture<'_> {
        Box::pin(async move {
            log_change_summary(&paths);
            if let Err(err) = self.run().await {
                error!(error = %err, "rebuild attempt failed");
            }
        })
    }
}

/// A second handle on our stdout, so the child's stderr lands in the same
/// stream as its stdout and our own log lines.
fn stdout_as_stdio() -> std::io::Result<Stdio> {
    let fd = std::io::stdout().as_fd().try_clone_to_owned()?;
    Ok(Stdio::from(fd))
}

fn log_change_summary(paths: &BTreeSet<String>) {
    info!("{SEPARATOR}");
    info!("Rebuilding after {} file change(s):", paths.len());
    for path in paths.iter().take(SUMMARY_LIMIT) {
        info!("  - {path}");
    }
    if paths.len() > SUMMARY_LIMIT {
        info!("  ... and {} more", paths.len() - SUMMARY_LIMIT);
    }
    info!("{SEPARATOR}");
}
