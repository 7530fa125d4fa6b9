//! In-memory TaskMetadataStore
//!
//! Stands in for the excluded relational CRUD layer in mock mode and
//! tests. Status history is kept so tests can assert transition order.

use std::collections::HashMap;
use std::sync::Mutex;

use contracts::{ContractError, SimulationTask, TaskId, TaskMetadataStore, TaskStatus};

/// In-memory task metadata store
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, SimulationTask>>,
    history: Mutex<Vec<(TaskId, TaskStatus)>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All status transitions, in order of application.
    pub fn status_history(&self) -> Vec<(TaskId, TaskStatus)> {
        self.history.lock().unwrap().clone()
    }

    /// Current status of a task, if known.
    pub fn status_of(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.tasks.lock().unwrap().get(task_id).map(|t| t.status)
    }
}

impl TaskMetadataStore for InMemoryTaskStore {
    async fn create_task(&self, task: &SimulationTask) -> Result<(), ContractError> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&task.task_id) {
            return Err(ContractError::state(
                task.task_id.as_str(),
                "task already exists",
            ));
        }
        tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<(), ContractError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| ContractError::state(task_id.as_str(), "unknown task"))?;
        task.set_status(status);
        self.history.lock().unwrap().push((task_id.clone(), status));
        Ok(())
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Option<SimulationTask>, ContractError> {
        Ok(self.tasks.lock().unwrap().get(task_id).cloned())
    }
}
