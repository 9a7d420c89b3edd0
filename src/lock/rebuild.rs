// src/lock/rebuild.rs

//! At-most-one-rebuild lock.
//!
//! The lock is a sentinel file that exists exactly while a rebuild runs: if it
//! is present, the lock is busy. It is created with `O_EXCL`, so "check, then
//! create" is one atomic step, and the holder also keeps an exclusive advisory
//! lock (`flock`) on it for as long as the rebuild runs.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// Result of [`RebuildLock::acquire`].
#[derive(Debug)]
pub enum LockStatus {
    /// We own the lock until the guard is released or dropped.
    Acquired(RebuildLockGuard),
    /// A rebuild is already in progress; the caller should skip, not fail.
    Busy,
}

#[derive(Debug, Clone)]
pub struct RebuildLock {
    path: PathBuf,
}

impl RebuildLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the sentinel currently exists.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Delete a sentinel left behind by a previous daemon run.
    ///
    /// Called once at startup, before any rebuild can start: nothing this
    /// process runs can own it yet. Returns whether a file was removed.
    pub fn clear_stale(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(file = %self.path.display(), "removed stale lock file from previous run");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Try to become the single running rebuild.
    pub fn acquire(&self) -> Result<LockStatus> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                info!(file = %self.path.display(), "lock file exists, rebuild already in progress");
                return Ok(LockStatus::Busy);
            }
            Err(err) => return Err(err.into()),
        };

        // From here on the sentinel is ours: every early return must delete it.
        if let Err(err) = file.try_lock_exclusive() {
            discard_created(&self.path);
            if is_contended(&err) {
                info!(file = %self.path.display(), "lock file held, rebuild already in progress");
                return Ok(LockStatus::Busy);
            }
            return Err(err.into());
        }

        // A daemon starting up may clear the sentinel between our create and
        // our lock; then we locked an orphaned inode and the path, if present,
        // belongs to someone else.
        match still_linked(&file, &self.path) {
            Ok(true) => {}
            Ok(false) => {
                debug!(file = %self.path.display(), "lock file replaced while locking");
                return Ok(LockStatus::Busy);
            }
            Err(err) => {
                discard_created(&self.path);
                return Err(err);
            }
        }

        info!(file = %self.path.display(), "acquired rebuild lock");
        Ok(LockStatus::Acquired(RebuildLockGuard {
            path: self.path.clone(),
            file: Some(file),
        }))
    }
}

/// Held rebuild lock. Releasing deletes the sentinel, then drops the flock.
#[derive(Debug)]
pub struct RebuildLockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl RebuildLockGuard {
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match fs::remove_file(&self.path) {
            Ok(()) => info!(file = %self.path.display(), "released rebuild lock"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                file = %self.path.display(),
                error = %err,
                "failed to remove lock file"
            ),
        }
        let _ = FileExt::unlock(&file);
    }
}

impl Drop for RebuildLockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Delete a sentinel this process created but never handed to a guard.
fn discard_created(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(file = %path.display(), "removed unclaimed lock file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(
            file = %path.display(),
            error = %err,
            "failed to remove unclaimed lock file"
        ),
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn still_linked(file: &File, path: &Path) -> Result<bool> {
    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}
