//! Orchestrator - the exposed control surface
//!
//! Wires registry + dispatcher, session manager, statistics pipeline,
//! and the writer pool together, and runs the control loop that turns
//! session control requests into dispatcher calls.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContractError, ControlOp, ControlRequest, EngineEvents, InstanceId, MapResolver,
    OrchestratorConfig, OwnerId, SignalPlan, SimulationTask, SubmitAck, TaskConfig, TaskId,
    TaskMetadataStore, TaskStatus, TickMessage, VehicleFollowingModel, VehicleGeneratingModel,
    ViewerCommand,
};
use dispatcher::{EngineRegistry, InMemoryTaskStore, TaskDispatcher};
use engine_client::EngineControl;
use persistence::{JsonDocumentStore, PersistSnapshot, TaskRecorder, WriterHandle, WriterPool};
use session::SessionManager;
use statistics::StatisticsPipeline;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::{OrchestratorError, Result};

/// Control-request channel capacity
const CONTROL_CHANNEL_CAPACITY: usize = 64;

/// Resolves map ids to files under a base directory.
///
/// Stands in for the excluded map-management service; only a path comes
/// out of it.
pub struct StaticMapResolver {
    base: PathBuf,
}

impl StaticMapResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl MapResolver for StaticMapResolver {
    fn resolve_map_path(&self, map_id: &str) -> std::result::Result<PathBuf, ContractError> {
        if map_id.is_empty() {
            return Err(ContractError::validation("map_id", "map id cannot be empty"));
        }
        Ok(self.base.join(format!("{map_id}.net.json")))
    }
}

/// Logs engine/orchestrator status callbacks
struct StatusLog;

impl EngineEvents for StatusLog {
    fn instance_available(&self, instance_id: &InstanceId, addresses: &[String]) {
        info!(instance_id = %instance_id, addresses = ?addresses, "engine instance available");
    }

    fn task_status_changed(&self, task_id: &TaskId, status: TaskStatus) {
        info!(task_id = %task_id, %status, "task status changed");
    }
}

/// The orchestration service facade
pub struct Orchestrator<C>
where
    C: EngineControl + Clone + Send + Sync + 'static,
{
    config: OrchestratorConfig,
    dispatcher: Arc<TaskDispatcher<C, InMemoryTaskStore>>,
    sessions: SessionManager,
    meta: Arc<InMemoryTaskStore>,
    maps: Arc<dyn MapResolver>,
    writer: WriterHandle<JsonDocumentStore>,
    pool: WriterPool<JsonDocumentStore>,
    events: Arc<StatusLog>,
    control_tx: mpsc::Sender<ControlRequest>,
    control_loop: JoinHandle<()>,
}

impl<C> Orchestrator<C>
where
    C: EngineControl + Clone + Send + Sync + 'static,
{
    /// Build the service from configuration.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let registry = EngineRegistry::new();
        let meta = Arc::new(InMemoryTaskStore::new());
        let dispatcher = Arc::new(TaskDispatcher::new(registry, meta.clone()));

        let events = Arc::new(StatusLog);
        dispatcher.set_listener(events.clone());

        let sessions = SessionManager::new(config.session.clone());

        let store = JsonDocumentStore::new("task-docs", &config.persistence.base_path)
            .map_err(ContractError::from)?;
        let pool = WriterPool::spawn(store, &config.persistence);
        let writer = pool.handle();

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let control_loop = tokio::spawn(control_loop(
            control_rx,
            dispatcher.clone(),
            sessions.clone(),
        ));

        let maps: Arc<dyn MapResolver> =
            Arc::new(StaticMapResolver::new(config.persistence.base_path.join("maps")));

        Ok(Self {
            config,
            dispatcher,
            sessions,
            meta,
            maps,
            writer,
            pool,
            events,
            control_tx,
            control_loop,
        })
    }

    /// Engine→orchestrator callback sink, for wiring into clients.
    pub fn events(&self) -> Arc<dyn EngineEvents> {
        self.events.clone()
    }

    /// Register an engine instance with the dispatcher's registry.
    pub async fn register_engine(
        &self,
        instance_id: InstanceId,
        addresses: Vec<String>,
        client: C,
    ) -> bool {
        self.events.instance_available(&instance_id, &addresses);
        self.dispatcher
            .registry()
            .register(instance_id, addresses, client)
            .await
    }

    /// Drop engine instances whose heartbeat went stale.
    pub async fn evict_stale_engines(&self) -> Vec<InstanceId> {
        let max_age = chrono::Duration::seconds(self.config.registry.stale_timeout_secs as i64);
        self.dispatcher.registry().evict_stale(max_age).await
    }

    pub async fn engine_count(&self) -> usize {
        self.dispatcher.registry().len().await
    }

    /// Create the task and its session. The viewer can attach from this
    /// point on, before any engine is involved.
    #[instrument(name = "orchestrator_prepare", skip(self, owner, config), fields(task_id = %task_id))]
    pub async fn prepare(
        &self,
        task_id: TaskId,
        owner: OwnerId,
        config: TaskConfig,
    ) -> Result<()> {
        let map_path = self.maps.resolve_map_path(&config.map_id)?;
        let task = SimulationTask::new(
            task_id.clone(),
            owner,
            map_path.display().to_string(),
            config,
        );
        self.meta.create_task(&task).await?;
        self.sessions.prepare(task_id)?;
        Ok(())
    }

    /// Submit the prepared task to an engine and start streaming.
    #[instrument(name = "orchestrator_start", skip(self), fields(task_id = %task_id))]
    pub async fn start(&self, task_id: &TaskId) -> Result<SubmitAck> {
        let task = self
            .meta
            .get_task(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::TaskNotFound {
                task_id: task_id.clone(),
            })?;

        let pipeline = StatisticsPipeline::new(&self.config.statistics);
        let recorder = TaskRecorder::new(
            task.clone(),
            self.config.persistence.mode,
            self.writer.clone(),
        );
        let callback =
            self.sessions
                .bind_engine(task_id, pipeline, recorder, self.control_tx.clone())?;

        match self.dispatcher.submit(&task, callback).await {
            Ok(ack) => Ok(ack),
            Err(e) => {
                // Undo the binding so the task can be restarted after a
                // fresh prepare
                self.sessions.close(task_id).await;
                Err(e.into())
            }
        }
    }

    /// Stop the task and tear its session down.
    pub async fn stop(&self, task_id: &TaskId) -> Result<()> {
        let result = self.dispatcher.control(task_id, ControlOp::Stop).await;
        self.sessions.close(task_id).await;
        result.map_err(Into::into)
    }

    pub async fn pause(&self, task_id: &TaskId) -> Result<()> {
        Ok(self.dispatcher.control(task_id, ControlOp::Pause).await?)
    }

    pub async fn resume(&self, task_id: &TaskId) -> Result<()> {
        Ok(self.dispatcher.control(task_id, ControlOp::Resume).await?)
    }

    /// Jump the simulation clock.
    pub async fn set_step(&self, task_id: &TaskId, step: u64) -> Result<()> {
        Ok(self
            .dispatcher
            .control(task_id, ControlOp::SetStep(step))
            .await?)
    }

    /// Adjust the coordinated green share (0-100).
    pub async fn control_green_ratio(&self, task_id: &TaskId, percent: u8) -> Result<()> {
        Ok(self
            .dispatcher
            .control(task_id, ControlOp::GreenRatio(percent))
            .await?)
    }

    pub async fn change_signal_plan(&self, task_id: &TaskId, plan: SignalPlan) -> Result<()> {
        Ok(self
            .dispatcher
            .control(task_id, ControlOp::SignalPlan(plan))
            .await?)
    }

    pub async fn set_vehicle_generating_model(
        &self,
        task_id: &TaskId,
        model: VehicleGeneratingModel,
    ) -> Result<()> {
        Ok(self
            .dispatcher
            .control(task_id, ControlOp::GeneratingModel(model))
            .await?)
    }

    pub async fn set_vehicle_following_model(
        &self,
        task_id: &TaskId,
        model: VehicleFollowingModel,
    ) -> Result<()> {
        Ok(self
            .dispatcher
            .control(task_id, ControlOp::FollowingModel(model))
            .await?)
    }

    /// Attach the (single) viewer to a session.
    pub fn take_viewer(&self, task_id: &TaskId) -> Result<mpsc::Receiver<TickMessage>> {
        Ok(self.sessions.take_viewer(task_id)?)
    }

    /// Sender for viewer control messages.
    pub fn command_sender(&self, task_id: &TaskId) -> Result<mpsc::Sender<ViewerCommand>> {
        Ok(self.sessions.command_sender(task_id)?)
    }

    pub async fn task_status(&self, task_id: &TaskId) -> Result<Option<TaskStatus>> {
        Ok(self.meta.get_task(task_id).await?.map(|t| t.status))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    /// Drain and stop: ends the control loop, flushes the writer pool,
    /// and returns the final persistence counters.
    pub async fn shutdown(self) -> PersistSnapshot {
        let Self {
            control_tx,
            control_loop,
            pool,
            ..
        } = self;

        drop(control_tx);
        if tokio::time::timeout(Duration::from_secs(5), control_loop)
            .await
            .is_err()
        {
            warn!("control loop did not drain in time");
        }

        let metrics = pool.metrics().clone();
        pool.shutdown().await;
        metrics.snapshot()
    }
}

/// Drains session control requests into dispatcher calls.
///
/// Lifecycle reports additionally close the session (a no-op when the
/// relay already removed itself).
async fn control_loop<C, M>(
    mut rx: mpsc::Receiver<ControlRequest>,
    dispatcher: Arc<TaskDispatcher<C, M>>,
    sessions: SessionManager,
) where
    C: EngineControl + Clone,
    M: TaskMetadataStore + Sync,
{
    while let Some(request) = rx.recv().await {
        let task_id = request.task_id.clone();
        let lifecycle = matches!(request.op, ControlOp::Completed | ControlOp::TimedOut);

        if let Err(e) = dispatcher.control(&task_id, request.op).await {
            warn!(task_id = %task_id, error = %e, "control request failed");
        }
        if lifecycle {
            sessions.close(&task_id).await;
        }
    }
}
