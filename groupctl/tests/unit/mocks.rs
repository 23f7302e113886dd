//! Test doubles shared by the unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use control_protocol::{ApiResponse, DeviceDispatch};
use groupctl::config::store::ConfigStore;
use groupctl::errors::ControlError;
use groupctl::http::api::ControlApi;
use groupctl::models::command::Command;
use groupctl::models::config::{ServerConfig, Session};
use groupctl::models::device::Device;
use groupctl::models::task::{Task, TaskStatus};
use groupctl::repository::store::LocalStore;
use groupctl::repository::{CommandRepository, DeviceRepository, TaskRepository};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct HealthCall {
    pub url: String,
    pub token: Option<String>,
    pub machines: Option<Vec<String>>,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct DispatchCall {
    pub url: String,
    pub token: String,
    pub payload: Vec<DeviceDispatch>,
}

#[derive(Debug, Clone)]
pub struct LoginCall {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Scriptable [`ControlApi`] that records every call
#[derive(Default)]
pub struct MockApi {
    health_script: Mutex<VecDeque<ApiResponse>>,
    health_default: Mutex<Option<ApiResponse>>,
    health_calls: Mutex<Vec<HealthCall>>,
    health_delay: Mutex<Option<Duration>>,
    dispatch_response: Mutex<Option<ApiResponse>>,
    dispatch_delay: Mutex<Option<Duration>>,
    dispatch_calls: Mutex<Vec<DispatchCall>>,
    panic_on_dispatch: AtomicBool,
    before_dispatch: Mutex<Option<Box<dyn Fn() + Send>>>,
    login_response: Mutex<Option<ApiResponse>>,
    login_calls: Mutex<Vec<LoginCall>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Response for every health check not covered by [`MockApi::push_health`]
    pub fn set_health(&self, response: ApiResponse) {
        *self.health_default.lock().unwrap() = Some(response);
    }

    /// Response for the next health check only
    pub fn push_health(&self, response: ApiResponse) {
        self.health_script.lock().unwrap().push_back(response);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        *self.health_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_dispatch(&self, response: ApiResponse) {
        *self.dispatch_response.lock().unwrap() = Some(response);
    }

    pub fn set_dispatch_delay(&self, delay: Duration) {
        *self.dispatch_delay.lock().unwrap() = Some(delay);
    }

    pub fn panic_on_dispatch(&self) {
        self.panic_on_dispatch.store(true, Ordering::SeqCst);
    }

    /// Run `hook` while each dispatch request is in flight
    pub fn on_dispatch(&self, hook: impl Fn() + Send + 'static) {
        *self.before_dispatch.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn set_login(&self, response: ApiResponse) {
        *self.login_response.lock().unwrap() = Some(response);
    }

    pub fn health_calls(&self) -> Vec<HealthCall> {
        self.health_calls.lock().unwrap().clone()
    }

    pub fn dispatch_calls(&self) -> Vec<DispatchCall> {
        self.dispatch_calls.lock().unwrap().clone()
    }

    pub fn login_calls(&self) -> Vec<LoginCall> {
        self.login_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlApi for MockApi {
    async fn check_health(
        &self,
        config: &ServerConfig,
        token: Option<&str>,
        machines: Option<&[String]>,
    ) -> ApiResponse {
        self.health_calls.lock().unwrap().push(HealthCall {
            url: config.send_url(),
            token: token.map(str::to_string),
            machines: machines.map(<[String]>::to_vec),
            at: Instant::now(),
        });

        let delay = *self.health_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.health_script.lock().unwrap().pop_front();
        scripted
            .or_else(|| self.health_default.lock().unwrap().clone())
            .unwrap_or_else(|| ApiResponse::new(0, "ok"))
    }

    async fn login(
        &self,
        config: &ServerConfig,
        username: &str,
        password: &SecretString,
    ) -> ApiResponse {
        self.login_calls.lock().unwrap().push(LoginCall {
            url: config.login_url(),
            username: username.to_string(),
            password: password.expose_secret().to_string(),
        });

        self.login_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ApiResponse::new(0, "login succeeded").with_data(json!({"token": "tok"})))
    }

    async fn dispatch(
        &self,
        config: &ServerConfig,
        token: &str,
        payload: &[DeviceDispatch],
    ) -> ApiResponse {
        self.dispatch_calls.lock().unwrap().push(DispatchCall {
            url: config.send_url(),
            token: token.to_string(),
            payload: payload.to_vec(),
        });

        let delay = *self.dispatch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = self.before_dispatch.lock().unwrap().as_ref() {
            hook();
        }
        if self.panic_on_dispatch.load(Ordering::SeqCst) {
            panic!("dispatch exploded");
        }

        self.dispatch_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ApiResponse::new(0, "task dispatched"))
    }
}

/// Task repository that records every status transition it is asked for
pub struct CountingTasks {
    inner: Arc<LocalStore>,
    transitions: Mutex<Vec<(i64, TaskStatus)>>,
}

impl CountingTasks {
    pub fn new(inner: Arc<LocalStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            transitions: Mutex::new(Vec::new()),
        })
    }

    pub fn transitions(&self) -> Vec<(i64, TaskStatus)> {
        self.transitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskRepository for CountingTasks {
    async fn get_task(&self, id: i64) -> Result<Option<Task>, ControlError> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ControlError> {
        self.inner.list_tasks().await
    }

    async fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, ControlError> {
        self.inner.tasks_by_status(status).await
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>, ControlError> {
        self.inner.search_tasks(query).await
    }

    async fn insert_task(&self, task: Task) -> Result<i64, ControlError> {
        self.inner.insert_task(task).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), ControlError> {
        self.inner.update_task(task).await
    }

    async fn transition_task(&self, id: i64, status: TaskStatus) -> Result<Task, ControlError> {
        self.transitions.lock().unwrap().push((id, status));
        self.inner.transition_task(id, status).await
    }

    async fn delete_task(&self, id: i64) -> Result<bool, ControlError> {
        self.inner.delete_task(id).await
    }

    async fn flush(&self) -> Result<(), ControlError> {
        TaskRepository::flush(self.inner.as_ref()).await
    }
}

pub fn server_config(url: &str, frequency_ms: u64) -> ServerConfig {
    ServerConfig {
        server_url: url.to_string(),
        request_frequency_ms: frequency_ms,
        ..Default::default()
    }
}

pub fn logged_in() -> Session {
    Session::new("tok", "alice")
}

/// Store with devices `dev-1` (#1) and `dev-2` (#2), command `tasks/foo`
/// (#1) and a 1h30m task (#1) targeting both devices
pub async fn seeded_store() -> (Arc<LocalStore>, Task) {
    let store = Arc::new(LocalStore::in_memory());
    store.insert_device(Device::new("first", "dev-1")).await.unwrap();
    store.insert_device(Device::new("second", "dev-2")).await.unwrap();
    store
        .insert_command(Command::new("foo", "tasks/foo"))
        .await
        .unwrap();

    let id = store
        .insert_task(Task::new("run foo", 1, vec![1, 2]).with_duration(1, 30))
        .await
        .unwrap();
    let task = store.get_task(id).await.unwrap().unwrap();
    (store, task)
}

pub fn config_store(config: ServerConfig, session: Session) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::in_memory(config, session))
}
