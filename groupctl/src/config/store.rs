//! Observable server configuration and session store

use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ControlError;
use crate::models::config::{ServerConfig, Session};
use crate::storage::json_file::JsonFile;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

struct BackingFiles {
    settings: JsonFile,
    session: JsonFile,
}

/// Holds the current [`ServerConfig`] and [`Session`].
///
/// Readers get cheap clones of the latest value; observers subscribe to a
/// `watch` channel and see every change in order, latest value winning.
/// When opened from a [`StorageLayout`] every mutation is written back, and
/// edits made by other processes are picked up by [`ConfigStore::reload`].
pub struct ConfigStore {
    config: watch::Sender<ServerConfig>,
    session: watch::Sender<Session>,
    files: Option<BackingFiles>,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Store without persistence
    pub fn in_memory(config: ServerConfig, session: Session) -> Self {
        Self {
            config: watch::Sender::new(config),
            session: watch::Sender::new(session),
            files: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Load `settings.json` and `session.json`; missing files yield defaults
    pub async fn open(layout: &StorageLayout) -> Result<Self, ControlError> {
        let settings_file = layout.settings_file();
        let session_file = layout.session_file();

        let settings: Settings = settings_file.read_or_default().await?;
        let session: Session = session_file.read_or_default().await?;
        debug!(
            "Loaded config for {:?}, authenticated: {}",
            settings.server.server_url,
            session.is_authenticated()
        );

        Ok(Self {
            config: watch::Sender::new(settings.server),
            session: watch::Sender::new(session),
            files: Some(BackingFiles {
                settings: settings_file,
                session: session_file,
            }),
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> ServerConfig {
        self.config.borrow().clone()
    }

    /// Observe configuration changes; the receiver starts at the current value
    pub fn subscribe(&self) -> watch::Receiver<ServerConfig> {
        self.config.subscribe()
    }

    /// Replace the configuration. Observers are only notified if it changed.
    pub async fn update_config(&self, config: ServerConfig) -> Result<bool, ControlError> {
        let _guard = self.write_lock.lock().await;

        let changed = self
            .config
            .send_if_modified(|current| replace_if_changed(current, &config));

        if changed {
            info!("Server configuration updated: {}", config.send_url());
            if let Some(files) = &self.files {
                let _lock = files.settings.lock().await?;
                let mut settings: Settings = files.settings.read_or_default().await?;
                settings.server = config;
                files.settings.write(&settings).await?;
            }
        }

        Ok(changed)
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Current token, `None` when blank
    pub fn token(&self) -> Option<String> {
        self.session.borrow().token().map(str::to_string)
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub async fn set_session(&self, session: Session) -> Result<(), ControlError> {
        let _guard = self.write_lock.lock().await;
        self.session.send_replace(session);
        self.persist_session().await
    }

    /// Drop `rejected` but keep the username for the next login.
    ///
    /// Returns `false` without clearing anything if the stored token is no
    /// longer `rejected`, i.e. a newer login replaced it in the meantime; the
    /// newer session is adopted instead.
    pub async fn clear_token(&self, rejected: &str) -> Result<bool, ControlError> {
        let _guard = self.write_lock.lock().await;
        let _lock = match &self.files {
            Some(files) => Some(files.session.lock().await?),
            None => None,
        };

        let mut stored = self.session();
        if let Some(files) = &self.files {
            stored = files.session.read_or_default().await?;
        }
        if stored.is_authenticated() && stored.token != rejected {
            info!("Session was replaced by a newer login, keeping it");
            self.session.send_if_modified(|current| replace_if_changed(current, &stored));
            return Ok(false);
        }

        stored.token.clear();
        let changed = self.session.send_if_modified(|current| replace_if_changed(current, &stored));
        if changed {
            info!("Session token cleared");
        }
        if let Some(files) = &self.files {
            files.session.write(&stored).await?;
        }
        Ok(true)
    }

    /// Drop token and username
    pub async fn clear_session(&self) -> Result<(), ControlError> {
        let _guard = self.write_lock.lock().await;
        self.session.send_replace(Session::default());
        self.persist_session().await
    }

    /// Re-read `settings.json` and `session.json` and publish whatever
    /// another process changed. Returns whether anything did.
    pub async fn reload(&self) -> Result<bool, ControlError> {
        let Some(files) = &self.files else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().await;

        let settings: Settings = files.settings.read_or_default().await?;
        let session: Session = files.session.read_or_default().await?;

        let config_changed = self
            .config
            .send_if_modified(|current| replace_if_changed(current, &settings.server));
        if config_changed {
            info!("Server configuration changed on disk: {}", settings.server.send_url());
        }

        let session_changed = self
            .session
            .send_if_modified(|current| replace_if_changed(current, &session));
        if session_changed {
            info!(
                "Session changed on disk, authenticated: {}",
                session.is_authenticated()
            );
        }

        Ok(config_changed || session_changed)
    }

    /// Call [`ConfigStore::reload`] every `interval` until `cancel` fires
    pub async fn watch_files(&self, interval: Duration, cancel: CancellationToken) {
        if self.files.is_none() {
            return;
        }
        debug!("Watching configuration files every {:?}", interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            if let Err(e) = self.reload().await {
                warn!("Failed to reload configuration files: {}", e);
            }
        }
    }

    async fn persist_session(&self) -> Result<(), ControlError> {
        let Some(files) = &self.files else {
            return Ok(());
        };
        let _lock = files.session.lock().await?;
        let session = self.session();
        files.session.write(&session).await
    }
}

fn replace_if_changed<T: Clone + PartialEq>(current: &mut T, next: &T) -> bool {
    if current == next {
        return false;
    }
    *current = next.clone();
    true
}
