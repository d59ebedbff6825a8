//! Advisory per-name process lock.
//!
//! Grounded on `include/process_mutex.h` / `src/process_mutex.cpp`: a
//! `ProcessMutex` is a `Socket` whose `lock()` binds+listens on a
//! well-known path; a second `lock()` — in this process or another one
//! bound to the same path — fails with *busy*, since only one listener can
//! own a given Unix socket path at a time.

use std::io::ErrorKind;
use std::os::unix::net::UnixListener;

use crate::error::{StageError, StageResult};

pub struct ProcessLock {
    path: String,
    listener: Option<UnixListener>,
}

impl ProcessLock {
    pub fn new(path: impl Into<String>) -> Self {
        ProcessLock {
            path: path.into(),
            listener: None,
        }
    }

    /// Acquire the lock. Fails with [`StageError::Busy`] if this instance
    /// already holds it, or if another process (or listener) is bound to
    /// the same path. Never unlinks a path it doesn't already own — a live
    /// socket at `path` means someone else holds the lock, and removing it
    /// out from under them would defeat the whole guarantee.
    pub fn lock(&mut self) -> StageResult<()> {
        if self.listener.is_some() {
            return Err(StageError::Busy);
        }
        match UnixListener::bind(&self.path) {
            Ok(listener) => {
                self.listener = Some(listener);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => Err(StageError::Busy),
            Err(e) => Err(StageError::Resource(format!("{}: {e}", self.path))),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.listener.is_some()
    }

    /// Release the lock and unlink the path.
    pub fn unlock(&mut self) {
        self.listener = None;
        let _ = nix::unistd::unlink(std::path::Path::new(&self.path));
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_lock_on_same_path_fails_busy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock.sock").to_str().unwrap().to_string();

        let mut first = ProcessLock::new(path.clone());
        first.lock().unwrap();

        let mut second = ProcessLock::new(path);
        match second.lock() {
            Err(StageError::Busy) => {}
            other => panic!("expected Busy, got {other:?}"),
        }
    }

    #[test]
    fn unlock_then_relock_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock2.sock").to_str().unwrap().to_string();

        let mut lock = ProcessLock::new(path);
        lock.lock().unwrap();
        lock.unlock();
        assert!(!lock.is_locked());
        lock.lock().unwrap();
        assert!(lock.is_locked());
    }
}
