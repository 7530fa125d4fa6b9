//! Storage contracts
//!
//! `StepStore` is the document-oriented persistence interface consumed by
//! the async writer pool. `TaskMetadataStore` and `MapResolver` are the
//! narrow interfaces onto excluded collaborators (relational task CRUD and
//! map management); this core never sees their internals.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractError, OwnerId, SimulationTask, StatisticsResult, StepFrame, TaskId, TaskStatus};

/// One persisted step: the frame plus its derived statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub frame: StepFrame,
    pub stats: StatisticsResult,
}

/// Document layout for a fully recorded task
///
/// Written once at session close in batch mode; grown step-by-step in
/// incremental mode. Keyed by task id, upserted, never user-editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedBatch {
    pub task_id: TaskId,
    pub owner_id: OwnerId,
    pub total_steps: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
}

/// Document-store write interface
///
/// All operations are upserts keyed by task id. Implementations must not
/// assume calls arrive on any particular worker; the pool shares one store
/// across workers.
#[trait_variant::make(StepStore: Send)]
pub trait LocalStepStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write a complete task document in one operation (batch mode).
    async fn write_batch(&self, batch: &PersistedBatch) -> Result<(), ContractError>;

    /// Append one step to the task's document (incremental mode).
    ///
    /// The first append for a task id creates the document and tags it
    /// with owner id and task metadata; later appends only push the step.
    async fn append_step(
        &self,
        task: &SimulationTask,
        record: &StepRecord,
    ) -> Result<(), ContractError>;

    /// Seal an incrementally grown document with its final step count and
    /// end timestamp.
    async fn finalize(
        &self,
        task_id: &TaskId,
        end_time: DateTime<Utc>,
        total_steps: u64,
    ) -> Result<(), ContractError>;
}

/// Relational task-metadata interface, owned by the excluded CRUD layer
#[trait_variant::make(TaskMetadataStore: Send)]
pub trait LocalTaskMetadataStore {
    async fn create_task(&self, task: &SimulationTask) -> Result<(), ContractError>;

    async fn update_status(&self, task_id: &TaskId, status: TaskStatus)
        -> Result<(), ContractError>;

    async fn get_task(&self, task_id: &TaskId) -> Result<Option<SimulationTask>, ContractError>;
}

/// Map resolution interface, owned by the excluded map-management layer
///
/// Only a path comes back; no map semantics are consumed here.
pub trait MapResolver: Send + Sync {
    fn resolve_map_path(&self, map_id: &str) -> Result<PathBuf, ContractError>;
}
