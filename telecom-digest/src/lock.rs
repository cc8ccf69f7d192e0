use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{DigestError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Exclusive claim on a state file for the duration of one run.
///
/// Released when dropped. A lock older than `stale_after` is assumed to
/// belong to a crashed run and is taken over.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: impl Into<PathBuf>, stale_after: Duration) -> Result<Self> {
        let path = path.into();
        let persist_err = |source: std::io::Error| DigestError::Persist {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }

        // Second pass only after removing a stale lock.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lock = Self::claim(path.clone(), &mut file)?;
                    file.sync_all().map_err(persist_err)?;
                    debug!("Acquired run lock {}", path.display());
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(&path, stale_after) {
                        return Err(DigestError::RunInProgress { path });
                    }
                    warn!("Taking over stale run lock {}", path.display());
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(persist_err(e)),
                    }
                }
                Err(e) => return Err(persist_err(e)),
            }
        }

        Err(DigestError::RunInProgress { path })
    }

    /// Take ownership of a freshly created lock file and record who holds it.
    /// The guard exists before the write, so a failed write removes the file.
    fn claim<W: Write>(path: PathBuf, writer: &mut W) -> Result<Self> {
        let lock = Self { path };
        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        serde_json::to_writer(&mut *writer, &info)?;
        writer.flush().map_err(|source| DigestError::Persist {
            path: lock.path.clone(),
            source,
        })?;
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release run lock {}: {}", self.path.display(), e);
        } else {
            debug!("Released run lock {}", self.path.display());
        }
    }
}

/// Age from the recorded acquisition time, falling back to the file's mtime
/// when the lock content is unreadable.
fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let recorded = fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<LockInfo>(&bytes).ok())
        .and_then(|info| (Utc::now() - info.acquired_at).to_std().ok());

    let age = recorded.or_else(|| {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
    });

    age.is_some_and(|age| age > stale_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn second_acquire_conflicts_until_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json.lock");

        let first = RunLock::acquire(&path, HOUR).unwrap();
        assert!(matches!(RunLock::acquire(&path, HOUR), Err(DigestError::RunInProgress { .. })));

        drop(first);
        assert!(!path.exists());
        assert!(RunLock::acquire(&path, HOUR).is_ok());
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json.lock");
        let old = LockInfo {
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        fs::write(&path, serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = RunLock::acquire(&path, HOUR).unwrap();
        let info: LockInfo = serde_json::from_slice(&fs::read(lock.path()).unwrap()).unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_lock_write_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json.lock");
        fs::write(&path, b"").unwrap();

        assert!(RunLock::claim(path.clone(), &mut FullDisk).is_err());
        assert!(!path.exists());
        assert!(RunLock::acquire(&path, HOUR).is_ok());
    }

    #[test]
    fn fresh_unreadable_lock_is_respected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json.lock");
        fs::write(&path, b"garbage").unwrap();
        assert!(matches!(RunLock::acquire(&path, HOUR), Err(DigestError::RunInProgress { .. })));
    }
}
