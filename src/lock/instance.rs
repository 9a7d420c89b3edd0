// src/lock/instance.rs

//! Single-daemon-per-host guard.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, error, info, warn};

use crate::config::DaemonSettings;
use crate::errors::{RebuildError, Result};

/// How long to wait for a live competitor before giving up.
#[derive(Debug, Clone, Copy)]
pub struct InstancePolicy {
    pub retry_delay: Duration,
    pub max_retries: u32,
}

impl From<&DaemonSettings> for InstancePolicy {
    fn from(settings: &DaemonSettings) -> Self {
        Self {
            retry_delay: settings.instance_retry_delay,
            max_retries: settings.instance_max_retries,
        }
    }
}

/// What the marker currently says.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MarkerState {
    Absent,
    Live(i32),
    Stale(String),
}

/// Ownership of the instance marker for the lifetime of this daemon.
///
/// The marker is removed by [`InstanceGuard::release`] or, failing that,
/// when the guard is dropped.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl InstanceGuard {
    /// Wait until no other live daemon owns `path`, then write our PID to it.
    ///
    /// A marker naming a live process is rechecked every
    /// `policy.retry_delay`; after `policy.max_retries` checks the call fails
    /// with [`RebuildError::AlreadyRunning`]. A marker naming a dead process,
    /// or one that does not parse, is deleted straight away.
    pub async fn acquire(path: impl Into<PathBuf>, policy: InstancePolicy) -> Result<Self> {
        let path = path.into();
        let pid = std::process::id();
        let mut retries = 0u32;

        loop {
            let mut overwrite = false;

            match read_marker(&path)? {
                MarkerState::Absent => {}
                MarkerState::Live(other) => {
                    retries += 1;
                    if retries >= policy.max_retries {
                        error!(
                            pid = other,
                            retries,
                            "another instance is still running, giving up"
                        );
                        return Err(RebuildError::AlreadyRunning {
                            pid: other,
                            retries,
                        });
                    }
                    info!(
                        pid = other,
                        "another instance is running, waiting {:?} (retry {}/{})",
                        policy.retry_delay,
                        retries,
                        policy.max_retries
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                    continue;
                }
                MarkerState::Stale(reason) => {
                    info!(file = %path.display(), %reason, "removing stale instance file");
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(err) if err.kind() == ErrorKind::NotFound => {}
                        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                            warn!(
                                file = %path.display(),
                                "cannot remove stale instance file (owned by another user), continuing anyway"
                            );
                            overwrite = true;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            match write_marker(&path, pid, overwrite) {
                Ok(()) => {
                    info!(file = %path.display(), pid, "created instance file");
                    return Ok(Self {
                        path,
                        pid,
                        released: false,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    // Another daemon won the race between our check and create.
                    debug!(file = %path.display(), "instance file appeared concurrently; rechecking");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Remove the marker. Called on every shutdown path.
    pub fn release(mut self) {
        self.remove_marker();
    }

    fn remove_marker(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => info!(file = %self.path.display(), "removed instance file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                file = %self.path.display(),
                error = %err,
                "failed to remove instance file"
            ),
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.remove_marker();
    }
}

/// Whether `pid` names a process that currently exists.
///
/// A process we may not signal (`EPERM`, e.g. owned by another user) still
/// exists. Non-positive values would address process groups and are never
/// treated as alive.
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn read_marker(path: &Path) -> Result<MarkerState> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(MarkerState::Absent),
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            return Ok(MarkerState::Stale("instance file is not text".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let pid = match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => pid,
        _ => {
            return Ok(MarkerState::Stale(format!(
                "unparsable PID {:?}",
                contents.trim()
            )));
        }
    };

    if process_alive(pid) {
        Ok(MarkerState::Live(pid))
    } else {
        Ok(MarkerState::Stale(format!("PID {pid} not running")))
    }
}

fn write_marker(path: &Path, pid: u32, overwrite: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path)?;
    file.write_all(pid.to_string().as_bytes())?;
    file.sync_all()
}
