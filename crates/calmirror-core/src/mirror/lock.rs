//! Advisory lock guarding against overlapping cycles.
//!
//! Scheduled runs (cron, systemd timers) can overlap when a cycle is slow.
//! The lock is an exclusive `flock`-style lock on a small file, released
//! by the OS when the holding process exits, so a crashed run never leaves
//! a stale lock behind.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockWriteGuard};

use crate::error::{CoreError, Result};

/// Lock file handle. Acquire with [`CycleLock::try_acquire`].
pub struct CycleLock {
    path: PathBuf,
    lock: RwLock<File>,
}

/// Held for the duration of a cycle; dropping it releases the lock.
pub struct CycleGuard<'a> {
    _guard: RwLockWriteGuard<'a, File>,
}

impl CycleLock {
    /// Open (creating if needed) the lock file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock without waiting.
    ///
    /// # Errors
    /// [`CoreError::CycleAlreadyRunning`] if another holder has it.
    pub fn try_acquire(&mut self) -> Result<CycleGuard<'_>> {
        let mut guard = match self.lock.try_write() {
            Ok(guard) => guard,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(CoreError::CycleAlreadyRunning {
                    lock_path: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        // Record the holder for whoever finds the file.
        guard.set_len(0)?;
        guard.seek(SeekFrom::Start(0))?;
        writeln!(guard, "{}", std::process::id())?;

        Ok(CycleGuard { _guard: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calmirror.lock");

        let mut first = CycleLock::open(&path).unwrap();
        let mut second = CycleLock::open(&path).unwrap();

        let guard = first.try_acquire().unwrap();
        let err = second.try_acquire().err().unwrap();
        assert!(matches!(err, CoreError::CycleAlreadyRunning { lock_path } if lock_path == path));

        drop(guard);
        assert!(second.try_acquire().is_ok());
    }

    #[test]
    fn holder_pid_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("calmirror.lock");

        let mut lock = CycleLock::open(&path).unwrap();
        let _guard = lock.try_acquire().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
