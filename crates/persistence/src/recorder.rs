//! TaskRecorder - per-session persistence facade
//!
//! Hides the batch/incremental distinction from the relay: `record` per
//! tick, `finish` at session close. Owned by exactly one relay task.

use chrono::{DateTime, Utc};
use contracts::{PersistedBatch, PersistenceMode, SimulationTask, StepRecord, StepStore};
use tracing::debug;

use crate::pool::{WriteJob, WriterHandle};

/// Records one task's steps in the configured mode
pub struct TaskRecorder<S> {
    task: SimulationTask,
    mode: PersistenceMode,
    writer: WriterHandle<S>,
    start_time: DateTime<Utc>,
    steps_recorded: u64,

    /// Batch mode only: steps held until close
    pending: Vec<StepRecord>,
}

impl<S: StepStore + Send + Sync> TaskRecorder<S> {
    pub fn new(task: SimulationTask, mode: PersistenceMode, writer: WriterHandle<S>) -> Self {
        Self {
            task,
            mode,
            writer,
            start_time: Utc::now(),
            steps_recorded: 0,
            pending: Vec::new(),
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub fn steps_recorded(&self) -> u64 {
        self.steps_recorded
    }

    /// Hand one step over for persistence.
    ///
    /// Incremental mode enqueues immediately; batch mode buffers until
    /// `finish`.
    pub async fn record(&mut self, record: StepRecord) {
        self.steps_recorded += 1;
        match self.mode {
            PersistenceMode::Batch => self.pending.push(record),
            PersistenceMode::Incremental => {
                self.writer
                    .submit(WriteJob::Append {
                        task: self.task.clone(),
                        record,
                    })
                    .await;
            }
        }
    }

    /// Flush at session close. Returns the number of recorded steps.
    pub async fn finish(self) -> u64 {
        let end_time = Utc::now();

        match self.mode {
            PersistenceMode::Batch => {
                if self.pending.is_empty() {
                    debug!(task_id = %self.task.task_id, "no steps recorded, skipping batch write");
                    return 0;
                }
                let batch = PersistedBatch {
                    task_id: self.task.task_id.clone(),
                    owner_id: self.task.owner_id.clone(),
                    total_steps: self.pending.len() as u64,
                    start_time: self.start_time,
                    end_time,
                    steps: self.pending,
                };
                self.writer.submit(WriteJob::Batch(batch)).await;
            }
            PersistenceMode::Incremental => {
                self.writer
                    .submit(WriteJob::Finalize {
                        task_id: self.task.task_id.clone(),
                        end_time,
                        total_steps: self.steps_recorded,
                    })
                    .await;
            }
        }

        self.steps_recorded
    }
}
