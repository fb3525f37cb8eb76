//! Cross-process exclusive lock on an output file.
//!
//! The lock lives on a `.lock` sidecar next to the target so the target
//! itself can be replaced by rename while the lock is held.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::IndexerError;

/// Sidecar lock path of `target`.
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock for `target` is held by this process.
    pub fn acquire(target: &Path) -> Result<Self, IndexerError> {
        let path = lock_path(target);
        let lock_err = |e: std::io::Error| IndexerError::Lock {
            path: path.clone(),
            message: e.to_string(),
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;
        lock_exclusive(&file).map_err(lock_err)?;

        Ok(Self { file, path })
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        // SAFETY: the descriptor is owned by `file` and open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    let _ = file;
    Ok(())
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: see `lock_exclusive`.
            let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
            if rc != 0 {
                tracing::warn!(path = ?self.path, "Failed to release merge lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/out/dom/Node.cpp")),
            PathBuf::from("/out/dom/Node.cpp.lock")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_excludes_second_holder() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.cpp");
        let held = Arc::new(AtomicBool::new(false));

        let lock = FileLock::acquire(&target).unwrap();
        held.store(true, Ordering::SeqCst);

        let waiter = {
            let target = target.clone();
            let held = Arc::clone(&held);
            std::thread::spawn(move || {
                let _lock = FileLock::acquire(&target).unwrap();
                // The first holder must have let go by now.
                assert!(!held.load(Ordering::SeqCst));
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        held.store(false, Ordering::SeqCst);
        drop(lock);
        waiter.join().unwrap();
    }
}
