//! WriterPool - bounded worker pool for document writes
//!
//! Workers drain a bounded MPMC queue. Submission never waits for queue
//! space: when the queue is full the submitting task runs the write
//! itself, and the `sync_fallback_writes` counter records every such
//! write. Records are never dropped.

use std::sync::Arc;
use std::thread::available_parallelism;

use async_channel::{Receiver, Sender, TrySendError};
use chrono::{DateTime, Utc};
use contracts::{PersistedBatch, PersistenceConfig, SimulationTask, StepRecord, StepStore, TaskId};
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::metrics::PersistMetrics;

/// One unit of persistence work
#[derive(Debug)]
pub enum WriteJob {
    /// Whole-task document (batch mode, written at session close)
    Batch(PersistedBatch),

    /// Single-step upsert-and-push (incremental mode)
    Append {
        task: SimulationTask,
        record: StepRecord,
    },

    /// Seal an incrementally grown document
    Finalize {
        task_id: TaskId,
        end_time: DateTime<Utc>,
        total_steps: u64,
    },
}

/// Worker count: half the available compute units, at least one
fn default_worker_count() -> usize {
    available_parallelism().map(|n| n.get()).unwrap_or(2) / 2
}

/// Bounded pool of writer workers sharing one store
pub struct WriterPool<S> {
    store: Arc<S>,
    tx: Sender<WriteJob>,
    workers: Vec<JoinHandle<()>>,
    metrics: Arc<PersistMetrics>,
}

impl<S: StepStore + Send + Sync + 'static> WriterPool<S> {
    /// Spawn the pool.
    pub fn spawn(store: S, config: &PersistenceConfig) -> Self {
        let worker_count = if config.workers > 0 {
            config.workers
        } else {
            default_worker_count().max(1)
        };

        let store = Arc::new(store);
        let metrics = Arc::new(PersistMetrics::new());
        let (tx, rx) = async_channel::bounded(config.queue_capacity);

        let workers = (0..worker_count)
            .map(|index| {
                let store = store.clone();
                let rx: Receiver<WriteJob> = rx.clone();
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    worker_loop(index, store, rx, metrics).await;
                })
            })
            .collect();

        Self {
            store,
            tx,
            workers,
            metrics,
        }
    }

    /// Cheap handle for submitting work.
    pub fn handle(&self) -> WriterHandle<S> {
        WriterHandle {
            tx: self.tx.clone(),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn metrics(&self) -> &Arc<PersistMetrics> {
        &self.metrics
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue and wait for workers to drain it.
    pub async fn shutdown(self) {
        self.tx.close();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "writer worker panicked");
            }
        }
        debug!("writer pool shutdown complete");
    }
}

/// Clonable submission handle
pub struct WriterHandle<S> {
    tx: Sender<WriteJob>,
    store: Arc<S>,
    metrics: Arc<PersistMetrics>,
}

impl<S> Clone for WriterHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: StepStore + Send + Sync> WriterHandle<S> {
    /// Submit a job; runs it inline when the queue cannot take it.
    pub async fn submit(&self, job: WriteJob) {
        match self.tx.try_send(job) {
            Ok(()) => {
                self.metrics.set_queue_len(self.tx.len());
            }
            Err(TrySendError::Full(job)) => {
                self.metrics.inc_sync_fallback();
                counter!("traffic_orchestrator_persist_sync_fallback_total").increment(1);
                warn!("writer queue full, executing write on submitting task");
                execute_job(self.store.as_ref(), job, &self.metrics).await;
            }
            Err(TrySendError::Closed(job)) => {
                // Shutting down: still never drop a record
                warn!("writer pool closed, executing write on submitting task");
                execute_job(self.store.as_ref(), job, &self.metrics).await;
            }
        }
    }

    pub fn metrics(&self) -> &Arc<PersistMetrics> {
        &self.metrics
    }
}

async fn worker_loop<S: StepStore>(
    index: usize,
    store: Arc<S>,
    rx: Receiver<WriteJob>,
    metrics: Arc<PersistMetrics>,
) {
    debug!(worker = index, store = store.name(), "writer worker started");
    while let Ok(job) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        execute_job(store.as_ref(), job, &metrics).await;
    }
    debug!(worker = index, "writer worker stopped");
}

/// Run one job against the store. Failures are logged and counted;
/// there is no automatic retry.
pub(crate) async fn execute_job<S: StepStore>(store: &S, job: WriteJob, metrics: &PersistMetrics) {
    let result = match &job {
        WriteJob::Batch(batch) => store.write_batch(batch).await,
        WriteJob::Append { task, record } => store.append_step(task, record).await,
        WriteJob::Finalize {
            task_id,
            end_time,
            total_steps,
        } => store.finalize(task_id, *end_time, *total_steps).await,
    };

    match result {
        Ok(()) => {
            metrics.inc_write_count();
            counter!("traffic_orchestrator_persist_writes_total").increment(1);
        }
        Err(e) => {
            metrics.inc_failure_count();
            counter!("traffic_orchestrator_persist_failures_total").increment(1);
            error!(store = store.name(), error = %e, "persistence write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, StatisticsResult, StepFrame, TaskConfig};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    /// Store that counts writes, with optional slowness/failure
    struct TestStore {
        writes: Arc<AtomicU64>,
        delay: Duration,
        fail: bool,
    }

    impl StepStore for TestStore {
        fn name(&self) -> &str {
            "test"
        }

        async fn write_batch(&self, _batch: &PersistedBatch) -> Result<(), ContractError> {
            self.write().await
        }

        async fn append_step(
            &self,
            _task: &SimulationTask,
            _record: &StepRecord,
        ) -> Result<(), ContractError> {
            self.write().await
        }

        async fn finalize(
            &self,
            _task_id: &TaskId,
            _end_time: DateTime<Utc>,
            _total_steps: u64,
        ) -> Result<(), ContractError> {
            self.write().await
        }
    }

    impl TestStore {
        async fn write(&self) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail {
                return Err(ContractError::storage("test", "injected failure"));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn append_job(step: u64) -> WriteJob {
        WriteJob::Append {
            task: SimulationTask::new(
                "t1".into(),
                "owner".into(),
                "/m".to_string(),
                TaskConfig::default(),
            ),
            record: StepRecord {
                frame: StepFrame {
                    task_id: "t1".into(),
                    step,
                    timestamp: 0.0,
                    vehicles: vec![],
                    signals: vec![],
                },
                stats: StatisticsResult::default(),
            },
        }
    }

    fn config(queue_capacity: usize, workers: usize) -> PersistenceConfig {
        PersistenceConfig {
            queue_capacity,
            workers,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pool_drains_all_jobs() {
        let writes = Arc::new(AtomicU64::new(0));
        let pool = WriterPool::spawn(
            TestStore {
                writes: writes.clone(),
                delay: Duration::ZERO,
                fail: false,
            },
            &config(16, 2),
        );

        let handle = pool.handle();
        for step in 0..10 {
            handle.submit(append_job(step)).await;
        }

        pool.shutdown().await;
        assert_eq!(writes.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_saturation_falls_back_to_submitting_task() {
        let writes = Arc::new(AtomicU64::new(0));
        // One slow worker and a single queue slot force the fallback
        let pool = WriterPool::spawn(
            TestStore {
                writes: writes.clone(),
                delay: Duration::from_millis(30),
                fail: false,
            },
            &config(1, 1),
        );

        let handle = pool.handle();
        let jobs = 6u64;
        for step in 0..jobs {
            handle.submit(append_job(step)).await;
        }

        // Some submissions had to write inline, and nothing was dropped
        assert!(pool.metrics().sync_fallback_writes() > 0);
        pool.shutdown().await;
        assert_eq!(writes.load(Ordering::SeqCst), jobs);
    }

    #[tokio::test]
    async fn test_failures_counted_not_retried() {
        let writes = Arc::new(AtomicU64::new(0));
        let pool = WriterPool::spawn(
            TestStore {
                writes: writes.clone(),
                delay: Duration::ZERO,
                fail: true,
            },
            &config(8, 1),
        );

        let handle = pool.handle();
        for step in 0..3 {
            handle.submit(append_job(step)).await;
        }
        let metrics = pool.metrics().clone();
        pool.shutdown().await;

        assert_eq!(writes.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.failure_count(), 3);
        assert_eq!(metrics.write_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_writes_inline() {
        let writes = Arc::new(AtomicU64::new(0));
        let pool = WriterPool::spawn(
            TestStore {
                writes: writes.clone(),
                delay: Duration::ZERO,
                fail: false,
            },
            &config(8, 1),
        );
        let handle = pool.handle();
        pool.shutdown().await;

        handle.submit(append_job(0)).await;
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_worker_count_positive() {
        assert!(default_worker_count().max(1) >= 1);
    }
}
