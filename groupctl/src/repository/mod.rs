//! Repository interfaces for devices, commands and tasks
//!
//! Components receive these as `Arc<dyn ...>` so the storage engine can be
//! swapped; [`store::LocalStore`] implements all three.

pub mod store;

use async_trait::async_trait;

use crate::errors::ControlError;
use crate::models::command::Command;
use crate::models::device::{Device, DeviceStatus};
use crate::models::task::{Task, TaskStatus};

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn get_device(&self, id: i64) -> Result<Option<Device>, ControlError>;

    /// Look a device up by the identifier the server uses
    async fn device_by_external_id(&self, device_id: &str)
        -> Result<Option<Device>, ControlError>;

    async fn list_devices(&self) -> Result<Vec<Device>, ControlError>;

    /// Insert and return the assigned row ID
    async fn insert_device(&self, device: Device) -> Result<i64, ControlError>;

    async fn update_device(&self, device: &Device) -> Result<(), ControlError>;

    /// Set the status; returns whether it changed
    async fn set_device_status(&self, id: i64, status: DeviceStatus)
        -> Result<bool, ControlError>;

    async fn delete_device(&self, id: i64) -> Result<bool, ControlError>;
}

#[async_trait]
pub trait CommandRepository: Send + Sync {
    async fn get_command(&self, id: i64) -> Result<Option<Command>, ControlError>;

    /// Pinned first, then by `order`, then by ID
    async fn list_commands(&self) -> Result<Vec<Command>, ControlError>;

    async fn insert_command(&self, command: Command) -> Result<i64, ControlError>;

    async fn update_command(&self, command: &Command) -> Result<(), ControlError>;

    async fn delete_command(&self, id: i64) -> Result<bool, ControlError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get_task(&self, id: i64) -> Result<Option<Task>, ControlError>;

    /// Newest first
    async fn list_tasks(&self) -> Result<Vec<Task>, ControlError>;

    async fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, ControlError>;

    /// Case-insensitive match on name or remark
    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>, ControlError>;

    async fn insert_task(&self, task: Task) -> Result<i64, ControlError>;

    /// Update editable fields. The persisted status is kept; status only
    /// changes through [`TaskRepository::transition_task`].
    async fn update_task(&self, task: &Task) -> Result<(), ControlError>;

    /// Atomically move a task to `status` if the persisted status allows it
    /// (see [`TaskStatus::can_transition_to`]) and return the updated row.
    ///
    /// Fails with [`ControlError::InvalidTransition`] otherwise, which is how
    /// two dispatches of the same task are kept apart.
    async fn transition_task(&self, id: i64, status: TaskStatus) -> Result<Task, ControlError>;

    async fn delete_task(&self, id: i64) -> Result<bool, ControlError>;

    /// Make committed changes durable. Repositories that write through on
    /// every change have nothing to do.
    async fn flush(&self) -> Result<(), ControlError> {
        Ok(())
    }
}
