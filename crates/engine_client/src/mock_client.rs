//! Mock engine client
//!
//! In-process engine used for development and tests. Runs a real tick
//! loop per submitted task and supports failure-scenario injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use contracts::{
    EngineEvents, InstanceId, RawStepPayload, SignalPlan, SimulationTask, StepCallback,
    SubmitAck, TaskId, TaskStatus, VehicleFollowingModel, VehicleGeneratingModel,
};
use tracing::{debug, instrument};

use crate::client::EngineControl;
use crate::error::{EngineClientError, Result};
use crate::mock_traffic;

/// Mock engine configuration
#[derive(Debug, Clone)]
pub struct MockEngineSettings {
    /// Identity reported in submit acknowledgements
    pub instance_id: InstanceId,

    /// Tick pacing
    pub tick_interval: Duration,

    /// Vehicles present in every generated frame
    pub vehicles_per_frame: usize,

    /// Step count when the task config does not specify one (0 = run
    /// until stopped)
    pub default_total_steps: u64,

    /// Inject a transport failure on submit
    pub fail_submit: bool,

    /// Inject a transport failure on every control call
    pub fail_control: bool,
}

impl Default for MockEngineSettings {
    fn default() -> Self {
        Self {
            instance_id: "mock-engine".into(),
            tick_interval: Duration::from_millis(10),
            vehicles_per_frame: 8,
            default_total_steps: 100,
            fail_submit: false,
            fail_control: false,
        }
    }
}

/// Control calls received by the mock, recorded for assertions
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCall {
    EngineAvailable { task_id: TaskId },
    SetStep { task_id: TaskId, step: u64 },
    Pause { task_id: TaskId },
    Resume { task_id: TaskId },
    Stop { task_id: TaskId },
    ChangeSignalPlan { task_id: TaskId, plan: SignalPlan },
    SetGreenRatio { task_id: TaskId, percent: u8 },
    SetGeneratingModel { task_id: TaskId, model: VehicleGeneratingModel },
    SetFollowingModel { task_id: TaskId, model: VehicleFollowingModel },
}

/// Per-task run state shared with the tick loop
#[derive(Debug, Default)]
struct TaskState {
    paused: AtomicBool,
    stopped: AtomicBool,
    jump: Mutex<Option<u64>>,
}

struct MockInner {
    settings: MockEngineSettings,
    events: Mutex<Option<Arc<dyn EngineEvents>>>,
    tasks: Mutex<HashMap<TaskId, Arc<TaskState>>>,
    control_log: Mutex<Vec<ControlCall>>,
}

/// Mock engine client
///
/// Cloning shares the same engine instance.
#[derive(Clone)]
pub struct MockEngineClient {
    inner: Arc<MockInner>,
}

impl MockEngineClient {
    /// Create a mock with default settings
    pub fn new() -> Self {
        Self::with_settings(MockEngineSettings::default())
    }

    /// Create a mock with the given settings
    pub fn with_settings(settings: MockEngineSettings) -> Self {
        Self {
            inner: Arc::new(MockInner {
                settings,
                events: Mutex::new(None),
                tasks: Mutex::new(HashMap::new()),
                control_log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Wire the engine→orchestrator notification channel.
    pub fn set_events(&self, events: Arc<dyn EngineEvents>) {
        *self.inner.events.lock().unwrap() = Some(events);
    }

    /// Number of tasks currently running on this mock
    pub fn running_tasks(&self) -> usize {
        self.inner.tasks.lock().unwrap().len()
    }

    /// Snapshot of all received control calls
    pub fn control_calls(&self) -> Vec<ControlCall> {
        self.inner.control_log.lock().unwrap().clone()
    }

    fn record(&self, call: ControlCall) {
        self.inner.control_log.lock().unwrap().push(call);
    }

    /// Common control-call gate: failure injection + task lookup
    fn task_state(&self, task_id: &TaskId) -> Result<Arc<TaskState>> {
        if self.inner.settings.fail_control {
            return Err(EngineClientError::transport("mock control failure"));
        }
        self.inner
            .tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| EngineClientError::TaskUnknown {
                task_id: task_id.clone(),
            })
    }
}

impl Default for MockEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineControl for MockEngineClient {
    #[instrument(name = "mock_engine_available", skip(self), fields(instance_id = %instance_id, task_id = %task_id))]
    async fn engine_available(&self, instance_id: &InstanceId, task_id: &TaskId) -> Result<()> {
        let _ = instance_id;
        self.record(ControlCall::EngineAvailable {
            task_id: task_id.clone(),
        });
        Ok(())
    }

    #[instrument(
        name = "mock_engine_submit",
        skip(self, task, on_step),
        fields(task_id = %task.task_id)
    )]
    async fn submit_task(&self, task: &SimulationTask, on_step: StepCallback) -> Result<SubmitAck> {
        if self.inner.settings.fail_submit {
            return Err(EngineClientError::transport("mock submit failure"));
        }

        let state = Arc::new(TaskState::default());
        {
            let mut tasks = self.inner.tasks.lock().unwrap();
            if tasks.contains_key(&task.task_id) {
                return Err(EngineClientError::AlreadyRunning {
                    task_id: task.task_id.clone(),
                });
            }
            tasks.insert(task.task_id.clone(), state.clone());
        }

        let inner = self.inner.clone();
        let task = task.clone();
        let task_id = task.task_id.clone();
        tokio::spawn(async move {
            run_tick_loop(inner, task, state, on_step).await;
        });

        Ok(SubmitAck {
            task_id,
            instance_id: self.inner.settings.instance_id.clone(),
            accepted_at: Utc::now(),
        })
    }

    async fn set_step(&self, task_id: &TaskId, step: u64) -> Result<()> {
        let state = self.task_state(task_id)?;
        *state.jump.lock().unwrap() = Some(step);
        self.record(ControlCall::SetStep {
            task_id: task_id.clone(),
            step,
        });
        Ok(())
    }

    async fn pause(&self, task_id: &TaskId) -> Result<()> {
        let state = self.task_state(task_id)?;
        state.paused.store(true, Ordering::SeqCst);
        self.record(ControlCall::Pause {
            task_id: task_id.clone(),
        });
        Ok(())
    }

    async fn resume(&self, task_id: &TaskId) -> Result<()> {
        let state = self.task_state(task_id)?;
        state.paused.store(false, Ordering::SeqCst);
        self.record(ControlCall::Resume {
            task_id: task_id.clone(),
        });
        Ok(())
    }

    async fn stop(&self, task_id: &TaskId) -> Result<()> {
        let state = self.task_state(task_id)?;
        state.stopped.store(true, Ordering::SeqCst);
        self.record(ControlCall::Stop {
            task_id: task_id.clone(),
        });
        Ok(())
    }

    async fn change_signal_plan(&self, task_id: &TaskId, plan: &SignalPlan) -> Result<()> {
        self.task_state(task_id)?;
        self.record(ControlCall::ChangeSignalPlan {
            task_id: task_id.clone(),
            plan: plan.clone(),
        });
        Ok(())
    }

    async fn set_green_ratio(&self, task_id: &TaskId, percent: u8) -> Result<()> {
        self.task_state(task_id)?;
        self.record(ControlCall::SetGreenRatio {
            task_id: task_id.clone(),
            percent,
        });
        Ok(())
    }

    async fn set_vehicle_generating_model(
        &self,
        task_id: &TaskId,
        model: &VehicleGeneratingModel,
    ) -> Result<()> {
        self.task_state(task_id)?;
        self.record(ControlCall::SetGeneratingModel {
            task_id: task_id.clone(),
            model: model.clone(),
        });
        Ok(())
    }

    async fn set_vehicle_following_model(
        &self,
        task_id: &TaskId,
        model: &VehicleFollowingModel,
    ) -> Result<()> {
        self.task_state(task_id)?;
        self.record(ControlCall::SetFollowingModel {
            task_id: task_id.clone(),
            model: model.clone(),
        });
        Ok(())
    }
}

/// The mock's tick loop: one payload per tick until done or stopped.
async fn run_tick_loop(
    inner: Arc<MockInner>,
    task: SimulationTask,
    state: Arc<TaskState>,
    on_step: StepCallback,
) {
    const PAUSE_POLL: Duration = Duration::from_millis(5);

    let settings = &inner.settings;
    let total = task
        .config
        .total_steps
        .unwrap_or(settings.default_total_steps);
    let unlimited = total == 0;
    let tick_secs = settings.tick_interval.as_secs_f64();

    debug!(task_id = %task.task_id, total, "mock tick loop started");

    let mut step: u64 = 0;
    while unlimited || step < total {
        if state.stopped.load(Ordering::SeqCst) {
            break;
        }
        if let Some(target) = state.jump.lock().unwrap().take() {
            step = if unlimited { target } else { target.min(total) };
        }
        while state.paused.load(Ordering::SeqCst) && !state.stopped.load(Ordering::SeqCst) {
            tokio::time::sleep(PAUSE_POLL).await;
        }
        if state.stopped.load(Ordering::SeqCst) {
            break;
        }

        let body = mock_traffic::step_payload(
            &task.task_id,
            step,
            step as f64 * tick_secs,
            settings.vehicles_per_frame,
        );
        on_step(RawStepPayload::new(task.task_id.clone(), body));

        step += 1;
        tokio::time::sleep(settings.tick_interval).await;
    }

    let status = if state.stopped.load(Ordering::SeqCst) {
        TaskStatus::Stopped
    } else {
        TaskStatus::Finished
    };

    inner.tasks.lock().unwrap().remove(&task.task_id);

    debug!(task_id = %task.task_id, steps = step, %status, "mock tick loop ended");

    let events = inner.events.lock().unwrap().clone();
    if let Some(events) = events {
        events.task_status_changed(&task.task_id, status);
    }
}
