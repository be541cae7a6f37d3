//! Single-instance guard
//!
//! The pid file is created exclusively at startup and removed only after a run
//! completes. A pid file found at startup therefore means either another run
//! is still going or the previous one died; both refuse to start.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::errors::{LockError, LockResult};

/// Held pid file; call [`PidFile::release`] when the run is done
#[derive(Debug)]
#[must_use = "the pid file stays on disk until released"]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create `path` holding the current process id
    pub async fn acquire(path: impl Into<PathBuf>) -> LockResult<Self> {
        let path = path.into();

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                error!(
                    "Found previous pid file {}, something was wrong during the last run",
                    path.display()
                );
                return Err(LockError::AlreadyRunning { path });
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        let pid = std::process::id().to_string();
        if let Err(source) = file.write_all(pid.as_bytes()).await {
            return Err(LockError::Io { path, source });
        }

        info!("Pid file {} created", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the pid file
    pub async fn release(self) -> LockResult<()> {
        fs::remove_file(&self.path)
            .await
            .map_err(|source| LockError::Io {
                path: self.path.clone(),
                source,
            })?;
        info!("Pid file {} removed", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_writes_pid_and_release_removes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("condarepo.pid");

        let pid_file = PidFile::acquire(&path).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, std::process::id().to_string());

        pid_file.release().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_existing_pid_file_refuses_start() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("condarepo.pid");
        std::fs::write(&path, b"12345").unwrap();

        let result = PidFile::acquire(&path).await;
        assert!(matches!(result, Err(LockError::AlreadyRunning { .. })));
        // Left untouched for the operator to inspect.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "12345");
    }

    #[tokio::test]
    async fn test_second_acquire_fails_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("condarepo.pid");

        let held = PidFile::acquire(&path).await.unwrap();
        assert!(PidFile::acquire(&path).await.is_err());
        held.release().await.unwrap();
        assert!(PidFile::acquire(&path).await.is_ok());
    }
}
