//! JsonDocumentStore - document store backed by one JSON file per task
//!
//! The document layout matches `PersistedBatch`: task id key, owner id,
//! step count, start/end timestamps, and the step array. Incremental
//! appends are read-modify-write upserts; the first append creates the
//! document and tags it with the task metadata.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{ContractError, PersistedBatch, SimulationTask, StepRecord, StepStore, TaskId};
use tracing::{debug, instrument};

/// Store writing task documents under a base directory
pub struct JsonDocumentStore {
    name: String,
    base_path: PathBuf,
}

impl JsonDocumentStore {
    /// Create the store, creating the base directory if needed.
    pub fn new(name: impl Into<String>, base_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            name: name.into(),
            base_path,
        })
    }

    /// Path of the document for a task id.
    pub fn document_path(&self, task_id: &TaskId) -> PathBuf {
        self.base_path.join(format!("{task_id}.json"))
    }

    /// Read a task document back, if present.
    pub fn load(&self, task_id: &TaskId) -> Result<Option<PersistedBatch>, ContractError> {
        let path = self.document_path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let batch = serde_json::from_str(&content)
            .map_err(|e| ContractError::storage(&self.name, format!("corrupt document: {e}")))?;
        Ok(Some(batch))
    }

    fn write_document(&self, path: &Path, batch: &PersistedBatch) -> Result<(), ContractError> {
        let file = File::create(path)?;
        serde_json::to_writer(file, batch)
            .map_err(|e| ContractError::storage(&self.name, e.to_string()))
    }
}

impl StepStore for JsonDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "doc_store_write_batch",
        skip(self, batch),
        fields(store = %self.name, task_id = %batch.task_id, steps = batch.steps.len())
    )]
    async fn write_batch(&self, batch: &PersistedBatch) -> Result<(), ContractError> {
        let path = self.document_path(&batch.task_id);
        self.write_document(&path, batch)?;
        debug!(task_id = %batch.task_id, "task document written");
        Ok(())
    }

    #[instrument(
        name = "doc_store_append_step",
        skip(self, task, record),
        fields(store = %self.name, task_id = %task.task_id, step = record.frame.step)
    )]
    async fn append_step(
        &self,
        task: &SimulationTask,
        record: &StepRecord,
    ) -> Result<(), ContractError> {
        let path = self.document_path(&task.task_id);

        let mut batch = match self.load(&task.task_id)? {
            Some(batch) => batch,
            // First insert: create the document with the task metadata
            None => PersistedBatch {
                task_id: task.task_id.clone(),
                owner_id: task.owner_id.clone(),
                total_steps: 0,
                start_time: Utc::now(),
                end_time: Utc::now(),
                steps: Vec::new(),
            },
        };

        batch.steps.push(record.clone());
        batch.total_steps = batch.steps.len() as u64;
        batch.end_time = Utc::now();

        self.write_document(&path, &batch)
    }

    #[instrument(
        name = "doc_store_finalize",
        skip(self, end_time),
        fields(store = %self.name, task_id = %task_id, total_steps)
    )]
    async fn finalize(
        &self,
        task_id: &TaskId,
        end_time: DateTime<Utc>,
        total_steps: u64,
    ) -> Result<(), ContractError> {
        let Some(mut batch) = self.load(task_id)? else {
            // Nothing was ever appended; a zero-step session leaves no document
            debug!(task_id = %task_id, "finalize without document, skipping");
            return Ok(());
        };

        batch.end_time = end_time;
        batch.total_steps = total_steps;
        self.write_document(&self.document_path(task_id), &batch)
    }
}
