//! TaskDispatcher - submission and control routing
//!
//! The dispatcher is the single writer of task status: every transition
//! goes through `set_status`, whether triggered by an explicit control
//! call, an engine failure, or a session lifecycle report.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use contracts::{
    ControlOp, EngineEvents, InstanceId, SimulationTask, StepCallback, SubmitAck, TaskId,
    TaskMetadataStore, TaskStatus,
};
use engine_client::EngineControl;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::error::DispatchError;
use crate::registry::EngineRegistry;

/// Routes task submissions and control commands to engine instances
pub struct TaskDispatcher<C, M> {
    registry: EngineRegistry<C>,
    meta: Arc<M>,

    /// task id -> bound instance (single writer per task)
    bindings: RwLock<HashMap<TaskId, InstanceId>>,

    listener: Mutex<Option<Arc<dyn EngineEvents>>>,
}

impl<C, M> TaskDispatcher<C, M>
where
    C: EngineControl + Clone,
    M: TaskMetadataStore + Sync,
{
    pub fn new(registry: EngineRegistry<C>, meta: Arc<M>) -> Self {
        Self {
            registry,
            meta,
            bindings: RwLock::new(HashMap::new()),
            listener: Mutex::new(None),
        }
    }

    /// Wire the status-change notification sink.
    pub fn set_listener(&self, listener: Arc<dyn EngineEvents>) {
        *self.listener.lock().unwrap() = Some(listener);
    }

    pub fn registry(&self) -> &EngineRegistry<C> {
        &self.registry
    }

    /// The instance currently bound to a task, if any.
    pub async fn bound_instance(&self, task_id: &TaskId) -> Option<InstanceId> {
        self.bindings.read().await.get(task_id).cloned()
    }

    /// Submit a task to the first available instance.
    ///
    /// Candidates are tried in registration order; a transport failure
    /// marks that instance unreachable and moves on. With no eligible
    /// instance left the task stays `Created` and `EngineUnavailable` is
    /// returned.
    #[instrument(name = "dispatch_submit", skip(self, task, on_step), fields(task_id = %task.task_id))]
    pub async fn submit(
        &self,
        task: &SimulationTask,
        on_step: StepCallback,
    ) -> Result<SubmitAck, DispatchError> {
        if let Some(instance_id) = self.bound_instance(&task.task_id).await {
            return Err(DispatchError::AlreadyRunning {
                task_id: task.task_id.clone(),
                instance_id,
            });
        }

        let candidates = self.registry.candidates().await;
        if candidates.is_empty() {
            return Err(DispatchError::EngineUnavailable);
        }

        for (instance_id, client) in candidates {
            if let Err(e) = client.engine_available(&instance_id, &task.task_id).await {
                if e.is_transport() {
                    self.registry.mark_unreachable(&instance_id).await;
                    continue;
                }
                return Err(e.into());
            }

            match client.submit_task(task, on_step.clone()).await {
                Ok(ack) => {
                    self.bindings
                        .write()
                        .await
                        .insert(task.task_id.clone(), instance_id.clone());
                    self.registry
                        .mark_busy(&instance_id, task.task_id.clone())
                        .await;
                    self.set_status(&task.task_id, TaskStatus::Running).await?;
                    info!(
                        task_id = %task.task_id,
                        instance_id = %instance_id,
                        "task submitted"
                    );
                    return Ok(ack);
                }
                Err(e) if e.is_transport() => {
                    warn!(
                        task_id = %task.task_id,
                        instance_id = %instance_id,
                        error = %e,
                        "submit failed, trying next instance"
                    );
                    self.registry.mark_unreachable(&instance_id).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DispatchError::EngineUnavailable)
    }

    /// Forward a control operation to the instance bound to the task.
    ///
    /// `Completed`/`TimedOut` are session lifecycle reports and only
    /// update bookkeeping; everything else reaches the engine.
    #[instrument(name = "dispatch_control", skip(self, op), fields(task_id = %task_id, op = ?op))]
    pub async fn control(&self, task_id: &TaskId, op: ControlOp) -> Result<(), DispatchError> {
        match op {
            ControlOp::Completed => {
                self.finish(task_id, TaskStatus::Finished).await?;
                return Ok(());
            }
            ControlOp::TimedOut => {
                // Best effort: tell the engine to stop before unbinding
                if let Some(instance_id) = self.bound_instance(task_id).await {
                    if let Some(client) = self.registry.client(&instance_id).await {
                        if let Err(e) = client.stop(task_id).await {
                            warn!(task_id = %task_id, error = %e, "stop on timeout failed");
                        }
                    }
                }
                self.finish(task_id, TaskStatus::Stopped).await?;
                return Ok(());
            }
            _ => {}
        }

        let instance_id = self
            .bound_instance(task_id)
            .await
            .ok_or_else(|| DispatchError::TaskNotFound {
                task_id: task_id.clone(),
            })?;

        let Some(client) = self.registry.client(&instance_id).await else {
            self.force_stop(task_id, "bound instance no longer registered")
                .await;
            return Err(DispatchError::unreachable(
                instance_id,
                "instance no longer registered",
            ));
        };

        let result = match &op {
            ControlOp::Pause => client.pause(task_id).await,
            ControlOp::Resume => client.resume(task_id).await,
            ControlOp::SetStep(step) => client.set_step(task_id, *step).await,
            ControlOp::GreenRatio(percent) => {
                if *percent > 100 {
                    return Err(DispatchError::invalid_control(
                        "green_ratio",
                        format!("must be within 0-100, got {percent}"),
                    ));
                }
                client.set_green_ratio(task_id, *percent).await
            }
            ControlOp::SignalPlan(plan) => {
                plan.validate()?;
                client.change_signal_plan(task_id, plan).await
            }
            ControlOp::GeneratingModel(model) => {
                client.set_vehicle_generating_model(task_id, model).await
            }
            ControlOp::FollowingModel(model) => {
                client.set_vehicle_following_model(task_id, model).await
            }
            ControlOp::Stop => client.stop(task_id).await,
            ControlOp::Completed | ControlOp::TimedOut => unreachable!("handled above"),
        };

        match result {
            Ok(()) => {
                match op {
                    ControlOp::Pause => self.set_status(task_id, TaskStatus::Paused).await?,
                    ControlOp::Resume => self.set_status(task_id, TaskStatus::Running).await?,
                    ControlOp::Stop => {
                        self.finish(task_id, TaskStatus::Stopped).await?;
                    }
                    _ => {}
                }
                Ok(())
            }
            Err(e) if e.is_transport() => {
                self.registry.mark_unreachable(&instance_id).await;
                let message = e.to_string();
                self.force_stop(task_id, &message).await;
                Err(DispatchError::unreachable(instance_id, message))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Unbind a task and record its terminal status.
    ///
    /// Idempotent: returns false (and does nothing) if the task is not
    /// bound, so a second `stop` or a late session report is a no-op.
    pub async fn finish(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<bool, DispatchError> {
        let removed = self.bindings.write().await.remove(task_id);
        match removed {
            Some(instance_id) => {
                self.registry.mark_available(&instance_id).await;
                self.set_status(task_id, status).await?;
                info!(task_id = %task_id, %status, "task finished");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Error-path stop: unbind and mark stopped without touching the
    /// (already invalidated) instance. Failures here are logged, not
    /// propagated, so they never mask the original error.
    async fn force_stop(&self, task_id: &TaskId, reason: &str) {
        warn!(task_id = %task_id, reason, "force-stopping task");
        self.bindings.write().await.remove(task_id);
        if let Err(e) = self.meta.update_status(task_id, TaskStatus::Stopped).await {
            warn!(task_id = %task_id, error = %e, "status update failed during force stop");
        }
        self.notify(task_id, TaskStatus::Stopped);
    }

    async fn set_status(&self, task_id: &TaskId, status: TaskStatus) -> Result<(), DispatchError> {
        self.meta.update_status(task_id, status).await?;
        self.notify(task_id, status);
        Ok(())
    }

    fn notify(&self, task_id: &TaskId, status: TaskStatus) {
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener.task_status_changed(task_id, status);
        }
    }
}
