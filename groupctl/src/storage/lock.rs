//! Advisory file locks shared between processes using the same layout

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use fs2::FileExt;

use crate::errors::ControlError;

/// Exclusive lock on a sidecar `.lock` file, released on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block (off the async runtime) until the lock at `path` is ours
    pub async fn exclusive(path: PathBuf) -> Result<Self, ControlError> {
        let locked = tokio::task::spawn_blocking(move || -> std::io::Result<FileLock> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(FileLock { file, path })
        })
        .await
        .map_err(|e| ControlError::Internal(format!("file lock task failed: {}", e)))?;

        Ok(locked?)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
