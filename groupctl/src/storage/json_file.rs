//! JSON document files

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::ControlError;
use crate::storage::lock::FileLock;

/// A JSON document stored at a fixed path
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
    private: bool,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            private: false,
        }
    }

    /// Document readable by the owner only (0o600 on Unix) from the moment
    /// it is created
    pub fn private(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            private: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read<T: DeserializeOwned>(&self) -> Result<T, ControlError> {
        let contents = fs::read_to_string(&self.path).await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Read the document, or `T::default()` if the file does not exist yet
    pub async fn read_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, ControlError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Take the exclusive lock guarding read-modify-write cycles on this
    /// document across processes
    pub async fn lock(&self) -> Result<FileLock, ControlError> {
        FileLock::exclusive(self.path.with_extension("json.lock")).await
    }

    /// Write through a temporary file and rename, so readers never see a
    /// half written document.
    pub async fn write<T: Serialize>(&self, value: &T) -> Result<(), ControlError> {
        let contents = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            if self.private {
                options.mode(0o600);
            }
        }

        let mut file = options.open(&temp_path).await?;
        #[cfg(unix)]
        {
            // mode() only applies when the file is created
            use std::os::unix::fs::PermissionsExt;
            if self.private {
                file.set_permissions(std::fs::Permissions::from_mode(0o600))
                    .await?;
            }
        }
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
