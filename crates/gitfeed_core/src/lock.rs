//! Cross-process mutual exclusion for sync cycles.
//!
//! The lock is an advisory exclusive lock on a file next to the repository.
//! Acquisition never blocks: a held lock is reported to the caller, which
//! skips the cycle. The lock is released when the guard drops, including
//! during unwinding.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A named cross-process lock.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Creates a lock backed by the file at `path`. Nothing is touched until
    /// the lock is acquired.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tries to acquire the lock without blocking.
    ///
    /// Returns `Ok(None)` if another holder has it.
    pub fn try_acquire(&self) -> CoreResult<Option<LockGuard>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %self.path.display(), "lock acquired");
                Ok(Some(LockGuard {
                    file,
                    path: self.path.clone(),
                }))
            }
            Err(err) if is_contended(&err) => Ok(None),
            Err(err) => Err(CoreError::Io(err)),
        }
    }

    /// Acquires the lock or fails with `LockUnavailable`.
    pub fn acquire(&self) -> CoreResult<LockGuard> {
        self.try_acquire()?
            .ok_or_else(|| CoreError::LockUnavailable {
                path: self.path.display().to_string(),
            })
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Holds a [`FileLock`] until dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %err, "failed to release lock");
        } else {
            debug!(path = %self.path.display(), "lock released");
        }
    }
}
