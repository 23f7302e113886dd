//! In-memory repository tables with optional JSON snapshots

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::ControlError;
use crate::models::command::Command;
use crate::models::device::{Device, DeviceStatus};
use crate::models::task::{Task, TaskStatus};
use crate::repository::{CommandRepository, DeviceRepository, TaskRepository};
use crate::storage::json_file::JsonFile;
use crate::storage::layout::StorageLayout;
use crate::utils::now_millis;

/// A row with an integer primary key
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

impl Record for Device {
    const KIND: &'static str = "device";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for Command {
    const KIND: &'static str = "command";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for Task {
    const KIND: &'static str = "task";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// A change to one row: `Some` upserts it, `None` deletes it
type Change<T> = (i64, Option<T>);

/// Rows as last seen, plus changes committed in memory that have not
/// reached the snapshot file yet
struct TableState<T: Record> {
    rows: BTreeMap<i64, T>,
    pending: BTreeMap<i64, Option<T>>,
}

impl<T: Record> TableState<T> {
    fn new(rows: Vec<T>) -> Self {
        Self {
            rows: rows.into_iter().map(|row| (row.id(), row)).collect(),
            pending: BTreeMap::new(),
        }
    }

    /// Replace the rows with a fresh snapshot and re-apply pending changes
    fn rebase(&mut self, rows: Vec<T>) {
        self.rows = rows.into_iter().map(|row| (row.id(), row)).collect();
        let pending = std::mem::take(&mut self.pending);
        for (id, change) in pending {
            self.apply((id, change));
        }
    }

    fn apply(&mut self, (id, change): Change<T>) {
        match &change {
            Some(row) => {
                self.rows.insert(id, row.clone());
            }
            None => {
                self.rows.remove(&id);
            }
        }
        self.pending.insert(id, change);
    }
}

/// One table.
///
/// A file backed table is shared with other processes using the same layout.
/// Every operation re-reads the snapshot, and every write holds the table's
/// file lock from that read until the merged snapshot is renamed into place,
/// so concurrent writers never drop each other's rows. A snapshot write that
/// fails leaves the change committed in memory and pending; the next write
/// or [`Table::flush`] retries it.
struct Table<T: Record> {
    state: Mutex<TableState<T>>,
    file: Option<JsonFile>,
}

impl<T: Record> Table<T> {
    fn empty() -> Self {
        Self {
            state: Mutex::new(TableState::new(Vec::new())),
            file: None,
        }
    }

    async fn load(file: JsonFile) -> Result<Self, ControlError> {
        let rows: Vec<T> = file.read_or_default().await?;
        debug!("Loaded {} {} rows from {:?}", rows.len(), T::KIND, file.path());

        Ok(Self {
            state: Mutex::new(TableState::new(rows)),
            file: Some(file),
        })
    }

    async fn get(&self, id: i64) -> Result<Option<T>, ControlError> {
        self.read(|rows| rows.get(&id).cloned()).await
    }

    async fn all(&self) -> Result<Vec<T>, ControlError> {
        self.read(|rows| rows.values().cloned().collect()).await
    }

    async fn find(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>, ControlError> {
        self.read(|rows| rows.values().filter(|row| predicate(*row)).cloned().collect())
            .await
    }

    async fn insert(&self, mut row: T) -> Result<i64, ControlError> {
        self.write(|rows| {
            let id = rows.keys().next_back().map_or(1, |last| last + 1);
            row.set_id(id);
            Ok((id, Some((id, Some(row)))))
        })
        .await
    }

    /// Apply `f` to a copy of the row and commit it if `f` succeeds. `f`
    /// returning `false` as its second value leaves the row untouched.
    async fn modify<R>(
        &self,
        id: i64,
        f: impl FnOnce(&mut T) -> Result<(R, bool), ControlError>,
    ) -> Result<R, ControlError> {
        self.write(|rows| {
            let mut updated = rows
                .get(&id)
                .cloned()
                .ok_or_else(|| ControlError::NotFound(format!("{} {}", T::KIND, id)))?;

            let (result, changed) = f(&mut updated)?;
            Ok((result, changed.then_some((id, Some(updated)))))
        })
        .await
    }

    async fn remove(&self, id: i64) -> Result<bool, ControlError> {
        self.write(|rows| {
            if rows.contains_key(&id) {
                Ok((true, Some((id, None))))
            } else {
                Ok((false, None))
            }
        })
        .await
    }

    /// Write pending changes to the snapshot file
    async fn flush(&self) -> Result<(), ControlError> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(());
        }
        let Some(file) = &self.file else {
            state.pending.clear();
            return Ok(());
        };

        let _lock = file.lock().await?;
        self.refresh(&mut state).await?;
        self.persist(&mut state).await
    }

    async fn read<R>(&self, f: impl FnOnce(&BTreeMap<i64, T>) -> R) -> Result<R, ControlError> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await?;
        Ok(f(&state.rows))
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&BTreeMap<i64, T>) -> Result<(R, Option<Change<T>>), ControlError>,
    ) -> Result<R, ControlError> {
        let mut state = self.state.lock().await;
        let _lock = match &self.file {
            Some(file) => Some(file.lock().await?),
            None => None,
        };
        self.refresh(&mut state).await?;

        let (result, change) = f(&state.rows)?;
        if let Some(change) = change {
            state.apply(change);
            if let Err(e) = self.persist(&mut state).await {
                warn!(
                    pending = state.pending.len(),
                    "Keeping {} change in memory until the next write: {}",
                    T::KIND,
                    e
                );
            }
        }
        Ok(result)
    }

    async fn refresh(&self, state: &mut TableState<T>) -> Result<(), ControlError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let rows: Vec<T> = file
            .read_or_default()
            .await
            .map_err(|e| ControlError::StorageError(format!("{} table: {}", T::KIND, e)))?;
        state.rebase(rows);
        Ok(())
    }

    async fn persist(&self, state: &mut TableState<T>) -> Result<(), ControlError> {
        if let Some(file) = &self.file {
            let snapshot: Vec<&T> = state.rows.values().collect();
            file.write(&snapshot)
                .await
                .map_err(|e| ControlError::StorageError(format!("{} table: {}", T::KIND, e)))?;
        }
        state.pending.clear();
        Ok(())
    }
}

/// Device, command and task tables in one store
pub struct LocalStore {
    devices: Table<Device>,
    commands: Table<Command>,
    tasks: Table<Task>,
}

impl LocalStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            devices: Table::empty(),
            commands: Table::empty(),
            tasks: Table::empty(),
        }
    }

    /// Load tables from the layout's JSON files and write every change back
    pub async fn open(layout: &StorageLayout) -> Result<Self, ControlError> {
        let store = Self {
            devices: Table::load(layout.devices_file()).await?,
            commands: Table::load(layout.commands_file()).await?,
            tasks: Table::load(layout.tasks_file()).await?,
        };
        info!("Opened local store at {:?}", layout.base_dir);
        Ok(store)
    }

    /// Retry snapshot writes that failed earlier
    pub async fn flush(&self) -> Result<(), ControlError> {
        self.devices.flush().await?;
        self.commands.flush().await?;
        self.tasks.flush().await
    }
}

#[async_trait]
impl DeviceRepository for LocalStore {
    async fn get_device(&self, id: i64) -> Result<Option<Device>, ControlError> {
        self.devices.get(id).await
    }

    async fn device_by_external_id(
        &self,
        device_id: &str,
    ) -> Result<Option<Device>, ControlError> {
        Ok(self
            .devices
            .find(|device| device.device_id == device_id)
            .await?
            .into_iter()
            .next())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, ControlError> {
        self.devices.all().await
    }

    async fn insert_device(&self, device: Device) -> Result<i64, ControlError> {
        self.devices.insert(device).await
    }

    async fn update_device(&self, device: &Device) -> Result<(), ControlError> {
        self.devices
            .modify(device.id, |row| {
                *row = device.clone();
                row.updated_at = now_millis();
                Ok(((), true))
            })
            .await
    }

    async fn set_device_status(
        &self,
        id: i64,
        status: DeviceStatus,
    ) -> Result<bool, ControlError> {
        self.devices
            .modify(id, |row| {
                if row.status == status {
                    return Ok((false, false));
                }
                row.status = status;
                row.updated_at = now_millis();
                Ok((true, true))
            })
            .await
    }

    async fn delete_device(&self, id: i64) -> Result<bool, ControlError> {
        self.devices.remove(id).await
    }
}

#[async_trait]
impl CommandRepository for LocalStore {
    async fn get_command(&self, id: i64) -> Result<Option<Command>, ControlError> {
        self.commands.get(id).await
    }

    async fn list_commands(&self) -> Result<Vec<Command>, ControlError> {
        let mut commands = self.commands.all().await?;
        commands.sort_by_key(|c| (!c.pinned, c.order, c.id));
        Ok(commands)
    }

    async fn insert_command(&self, command: Command) -> Result<i64, ControlError> {
        self.commands.insert(command).await
    }

    async fn update_command(&self, command: &Command) -> Result<(), ControlError> {
        self.commands
            .modify(command.id, |row| {
                *row = command.clone();
                Ok(((), true))
            })
            .await
    }

    async fn delete_command(&self, id: i64) -> Result<bool, ControlError> {
        self.commands.remove(id).await
    }
}

#[async_trait]
impl TaskRepository for LocalStore {
    async fn get_task(&self, id: i64) -> Result<Option<Task>, ControlError> {
        self.tasks.get(id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ControlError> {
        let mut tasks = self.tasks.all().await?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, ControlError> {
        self.tasks.find(|task| task.status == status).await
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>, ControlError> {
        let query = query.to_lowercase();
        self.tasks
            .find(|task| {
                task.name.to_lowercase().contains(&query)
                    || task.remark.to_lowercase().contains(&query)
            })
            .await
    }

    async fn insert_task(&self, task: Task) -> Result<i64, ControlError> {
        self.tasks.insert(task).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), ControlError> {
        self.tasks
            .modify(task.id, |row| {
                let status = row.status;
                *row = task.clone();
                row.status = status;
                row.updated_at = now_millis();
                Ok(((), true))
            })
            .await
    }

    async fn transition_task(&self, id: i64, status: TaskStatus) -> Result<Task, ControlError> {
        self.tasks
            .modify(id, |row| {
                if !row.status.can_transition_to(status) {
                    return Err(ControlError::InvalidTransition {
                        id,
                        from: row.status,
                        to: status,
                    });
                }
                row.status = status;
                row.updated_at = now_millis();
                Ok((row.clone(), true))
            })
            .await
    }

    async fn delete_task(&self, id: i64) -> Result<bool, ControlError> {
        self.tasks.remove(id).await
    }

    async fn flush(&self) -> Result<(), ControlError> {
        self.tasks.flush().await
    }
}
