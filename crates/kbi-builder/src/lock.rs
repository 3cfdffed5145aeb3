//! Scoped cross-process locks.
//!
//! Every mutate, regenerate and execute sequence holds an exclusive OS
//! advisory lock on `<data>/locks/<scope>.lock` for its whole duration. The
//! lock is tied to the open file handle, so it is released when the guard is
//! dropped, including when the owning future is abandoned.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{BuilderError, BuilderResult};

/// Scope shared by every catalog operation.
pub const CATALOG_SCOPE: &str = "catalog";

/// Scope of the operations on one pipeline.
pub fn pipeline_scope(pipeline: &str) -> String {
    format!("pipeline-{}", pipeline)
}

/// Lock directory of a project.
#[derive(Debug, Clone)]
pub struct ProjectLock {
    dir: PathBuf,
}

impl ProjectLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the lock file for `scope`.
    pub fn path(&self, scope: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", scope))
    }

    /// Wait for and take the exclusive lock on `scope`.
    pub async fn acquire(&self, scope: &str) -> BuilderResult<LockGuard> {
        let path = self.path(scope);
        let dir = self.dir.clone();

        let guard = tokio::task::spawn_blocking(move || -> std::io::Result<LockGuard> {
            std::fs::create_dir_all(&dir)?;
            let file = open_lock_file(&path)?;
            file.lock()?;
            Ok(LockGuard { file, path })
        })
        .await
        .map_err(|e| BuilderError::Io(std::io::Error::other(e)))??;

        tracing::debug!(scope = %scope, path = %guard.path.display(), "Lock acquired");
        Ok(guard)
    }
}

pub(crate) fn open_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "Lock release failed");
        } else {
            tracing::debug!(path = %self.path.display(), "Lock released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::TryLockError;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProjectLock::new(dir.path().join("locks"));

        let guard = lock.acquire(&pipeline_scope("etl")).await.unwrap();
        assert!(guard.path().ends_with("pipeline-etl.lock"));

        let other = open_lock_file(guard.path()).unwrap();
        assert!(matches!(other.try_lock(), Err(TryLockError::WouldBlock)));

        drop(guard);
        assert!(other.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProjectLock::new(dir.path());

        let _pipeline = lock.acquire(&pipeline_scope("etl")).await.unwrap();
        let _catalog = lock.acquire(CATALOG_SCOPE).await.unwrap();
        let _other = lock.acquire(&pipeline_scope("report")).await.unwrap();
    }

    #[tokio::test]
    async fn test_reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProjectLock::new(dir.path());

        drop(lock.acquire(CATALOG_SCOPE).await.unwrap());
        let again = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            lock.acquire(CATALOG_SCOPE),
        )
        .await;
        assert!(matches!(again, Ok(Ok(_))));
    }
}
