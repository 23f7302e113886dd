//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::ControlError;
use crate::storage::json_file::JsonFile;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "GROUPCTL_HOME";

/// On-disk layout for settings, session and repository tables
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn settings_file(&self) -> JsonFile {
        JsonFile::new(self.base_dir.join("settings.json"))
    }

    pub fn session_file(&self) -> JsonFile {
        JsonFile::private(self.base_dir.join("session.json"))
    }

    pub fn devices_file(&self) -> JsonFile {
        JsonFile::new(self.base_dir.join("devices.json"))
    }

    pub fn commands_file(&self) -> JsonFile {
        JsonFile::new(self.base_dir.join("commands.json"))
    }

    pub fn tasks_file(&self) -> JsonFile {
        JsonFile::new(self.base_dir.join("tasks.json"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Create the base and log directories
    pub async fn setup(&self) -> Result<(), ControlError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::create_dir_all(self.logs_dir()).await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        if let Some(dir) = std::env::var_os(HOME_ENV) {
            return Self::new(dir);
        }

        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".groupctl");

        Self::new(base_dir)
    }
}
