//! Task dispatcher
//!
//! Runs one task against the control server: RUNNING is persisted first,
//! then the dispatch request is built and sent, and exactly one of
//! COMPLETED or FAILED is persisted afterwards.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use control_protocol::dispatch_payload;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::config::store::ConfigStore;
use crate::errors::ControlError;
use crate::http::api::ControlApi;
use crate::models::task::{Task, TaskStatus};
use crate::repository::{CommandRepository, DeviceRepository, TaskRepository};

const TERMINAL_WRITE_ATTEMPTS: u32 = 3;
const TERMINAL_WRITE_BACKOFF: Duration = Duration::from_millis(200);

/// Dispatches tasks to the control server
#[derive(Clone)]
pub struct TaskDispatcher {
    tasks: Arc<dyn TaskRepository>,
    devices: Arc<dyn DeviceRepository>,
    commands: Arc<dyn CommandRepository>,
    config: Arc<ConfigStore>,
    api: Arc<dyn ControlApi>,
}

impl TaskDispatcher {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        devices: Arc<dyn DeviceRepository>,
        commands: Arc<dyn CommandRepository>,
        config: Arc<ConfigStore>,
        api: Arc<dyn ControlApi>,
    ) -> Self {
        Self {
            tasks,
            devices,
            commands,
            config,
            api,
        }
    }

    /// Execute a task and return the server's message on success.
    ///
    /// The lifecycle runs on its own tokio task, so dropping the returned
    /// future does not leave the task RUNNING. Fails with
    /// [`ControlError::InvalidTransition`] without writing anything if the
    /// task is already running.
    pub async fn execute(&self, task: &Task) -> Result<String, ControlError> {
        let dispatcher = self.clone();
        let task = task.clone();
        let task_id = task.id;

        tokio::spawn(async move { dispatcher.run_lifecycle(task).await })
            .await
            .map_err(|e| ControlError::Internal(format!("dispatch of task {} aborted: {}", task_id, e)))?
    }

    /// Load a task by ID and execute it
    pub async fn execute_by_id(&self, id: i64) -> Result<String, ControlError> {
        let task = self
            .tasks
            .get_task(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("task {}", id)))?;
        self.execute(&task).await
    }

    /// Mark tasks left RUNNING by a previous process as FAILED
    pub async fn reconcile_stale(&self) -> Result<usize, ControlError> {
        let stale = self.tasks.tasks_by_status(TaskStatus::Running).await?;
        let mut reconciled = 0;
        for task in stale {
            match self.tasks.transition_task(task.id, TaskStatus::Failed).await {
                Ok(_) => {
                    warn!(task_id = task.id, "Task '{}' was left running, marked failed", task.name);
                    reconciled += 1;
                }
                Err(e) => error!(task_id = task.id, "Failed to reconcile task: {}", e),
            }
        }
        Ok(reconciled)
    }

    async fn run_lifecycle(self, task: Task) -> Result<String, ControlError> {
        self.tasks.transition_task(task.id, TaskStatus::Running).await?;
        info!(task_id = task.id, "Dispatching task '{}'", task.name);

        let outcome = AssertUnwindSafe(self.send(&task))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ControlError::Internal(format!(
                    "dispatch panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        let status = match &outcome {
            Ok(_) => TaskStatus::Completed,
            Err(_) => TaskStatus::Failed,
        };
        if let Err(e) = self.finish(task.id, status).await {
            error!(task_id = task.id, "Failed to persist task status {}: {}", status, e);
        }

        match &outcome {
            Ok(message) => info!(task_id = task.id, "Task dispatched: {}", message),
            Err(e) => warn!(task_id = task.id, "Task dispatch failed: {}", e),
        }
        outcome
    }

    /// Record the terminal status, retrying until it is on disk. A write
    /// that never lands still leaves the status committed in the repository,
    /// to be flushed by its next write.
    async fn finish(&self, task_id: i64, status: TaskStatus) -> Result<(), ControlError> {
        let mut attempt = 1;
        loop {
            let result = match self.tasks.transition_task(task_id, status).await {
                Ok(_) => self.tasks.flush().await,
                // committed by an earlier attempt, only the flush failed
                Err(ControlError::InvalidTransition { from, .. }) if from == status => {
                    self.tasks.flush().await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < TERMINAL_WRITE_ATTEMPTS => {
                    warn!(
                        task_id,
                        attempt,
                        "Recording task status {} failed, retrying: {}",
                        status,
                        e
                    );
                    tokio::time::sleep(TERMINAL_WRITE_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, task: &Task) -> Result<String, ControlError> {
        let config = self.config.config();
        let token = match self.config.token() {
            Some(token) if config.is_pollable() => token,
            _ => return Err(ControlError::ConfigIncomplete),
        };

        let device_ids = self.resolve_devices(task).await;
        let action = self.resolve_action(task.command_id).await;
        let payload = dispatch_payload(&device_ids, &action, task.total_seconds());
        debug!(
            task_id = task.id,
            devices = device_ids.len(),
            "Sending dispatch for action '{}'",
            action
        );

        let response = self.api.dispatch(&config, &token, &payload).await;
        if response.is_success() {
            Ok(response.message)
        } else {
            Err(ControlError::DispatchRejected {
                code: response.code,
                message: response.message,
            })
        }
    }

    /// External IDs of the task's devices. Missing or blank ones are dropped.
    async fn resolve_devices(&self, task: &Task) -> Vec<String> {
        let mut resolved = Vec::with_capacity(task.device_ids.len());
        let mut dropped = 0usize;

        for id in &task.device_ids {
            match self.devices.get_device(*id).await {
                Ok(Some(device)) if !device.device_id.trim().is_empty() => {
                    resolved.push(device.device_id)
                }
                Ok(_) => dropped += 1,
                Err(e) => {
                    debug!(device = id, "Device lookup failed: {}", e);
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            warn!(
                task_id = task.id,
                dropped,
                "{} of {} devices could not be resolved",
                dropped,
                task.device_ids.len()
            );
        }
        resolved
    }

    async fn resolve_action(&self, command_id: i64) -> String {
        match self.commands.get_command(command_id).await {
            Ok(Some(command)) => command.script_ref,
            Ok(None) => {
                warn!(command_id, "Command not found, dispatching an empty action");
                String::new()
            }
            Err(e) => {
                warn!(command_id, "Command lookup failed, dispatching an empty action: {}", e);
                String::new()
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
