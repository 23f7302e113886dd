//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::authn::session::SessionManager;
use crate::config::store::ConfigStore;
use crate::dispatch::dispatcher::TaskDispatcher;
use crate::errors::ControlError;
use crate::http::api::ControlApi;
use crate::http::client::HttpClient;
use crate::repository::store::LocalStore;
use crate::service::controller::ServiceController;
use crate::status::StatusBoard;
use crate::sync::device_status::DeviceStatusSync;
use crate::workers::poller::Poller;

/// Main application state
pub struct AppState {
    /// Server configuration and session
    pub config: Arc<ConfigStore>,

    /// Device, command and task tables
    pub store: Arc<LocalStore>,

    /// Control server client
    pub api: Arc<dyn ControlApi>,

    /// Latest health status
    pub status: Arc<StatusBoard>,

    /// Poller lifecycle
    pub controller: Arc<ServiceController>,

    pub dispatcher: TaskDispatcher,

    pub sessions: SessionManager,
}

impl AppState {
    /// Open the on-disk stores and wire every component
    pub async fn init(options: &AppOptions) -> Result<Self, ControlError> {
        info!("Initializing application state...");

        let layout = &options.storage.layout;
        layout.setup().await?;

        let config = Arc::new(ConfigStore::open(layout).await?);
        let store = Arc::new(LocalStore::open(layout).await?);
        let api: Arc<dyn ControlApi> = Arc::new(HttpClient::new()?);

        Ok(Self::from_parts(options, config, store, api))
    }

    /// Wire components around existing stores and API client
    pub fn from_parts(
        options: &AppOptions,
        config: Arc<ConfigStore>,
        store: Arc<LocalStore>,
        api: Arc<dyn ControlApi>,
    ) -> Self {
        let status = Arc::new(StatusBoard::new());

        let device_sync = options
            .report_devices
            .then(|| DeviceStatusSync::new(store.clone()));
        let poller = Arc::new(Poller::new(
            config.clone(),
            api.clone(),
            status.clone(),
            device_sync,
            options.poller.clone(),
        ));
        let controller = Arc::new(ServiceController::new(
            poller,
            status.clone(),
            options.lifecycle.max_shutdown_delay,
        ));

        let dispatcher = TaskDispatcher::new(
            store.clone(),
            store.clone(),
            store.clone(),
            config.clone(),
            api.clone(),
        );
        let sessions = SessionManager::new(config.clone(), api.clone());

        Self {
            config,
            store,
            api,
            status,
            controller,
            dispatcher,
            sessions,
        }
    }
}
