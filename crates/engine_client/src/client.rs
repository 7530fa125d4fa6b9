//! Engine control abstraction
//!
//! Defines the request/response surface onto one engine instance,
//! supporting real transports and mock testing behind the same trait.
//! Every call is at-most-once: a transport failure surfaces an error and
//! the caller is responsible for invalidating the instance.

use std::future::Future;

use contracts::{
    InstanceId, SignalPlan, SimulationTask, StepCallback, SubmitAck, TaskId,
    VehicleFollowingModel, VehicleGeneratingModel,
};

use crate::error::Result;

/// Engine control trait
///
/// One implementor per engine instance. All operations target a task the
/// instance is (or is about to be) running; commands for unknown tasks
/// return `TaskUnknown` without side effects.
pub trait EngineControl: Send + Sync {
    /// Notify the engine it has been selected for a task.
    ///
    /// Fired by the dispatcher immediately before `submit_task`.
    fn engine_available(
        &self,
        instance_id: &InstanceId,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Submit a task for execution.
    ///
    /// On success the engine starts its tick loop and pushes one raw
    /// payload per tick through `on_step` until the task finishes or is
    /// stopped. Re-submitting a running task is rejected.
    fn submit_task(
        &self,
        task: &SimulationTask,
        on_step: StepCallback,
    ) -> impl Future<Output = Result<SubmitAck>> + Send;

    /// Jump the simulation clock to the given step.
    fn set_step(&self, task_id: &TaskId, step: u64) -> impl Future<Output = Result<()>> + Send;

    /// Suspend tick production; idempotent.
    fn pause(&self, task_id: &TaskId) -> impl Future<Output = Result<()>> + Send;

    /// Resume a paused task; idempotent.
    fn resume(&self, task_id: &TaskId) -> impl Future<Output = Result<()>> + Send;

    /// Terminate the task; the frame stream ends after in-flight ticks.
    fn stop(&self, task_id: &TaskId) -> impl Future<Output = Result<()>> + Send;

    /// Replace the signal plan of one crossing.
    fn change_signal_plan(
        &self,
        task_id: &TaskId,
        plan: &SignalPlan,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Adjust the green-time share of the coordinated direction (0-100).
    ///
    /// Range validation happens on the orchestrator side before the call.
    fn set_green_ratio(
        &self,
        task_id: &TaskId,
        percent: u8,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Swap the vehicle arrival model.
    fn set_vehicle_generating_model(
        &self,
        task_id: &TaskId,
        model: &VehicleGeneratingModel,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Swap the car-following model.
    fn set_vehicle_following_model(
        &self,
        task_id: &TaskId,
        model: &VehicleFollowingModel,
    ) -> impl Future<Output = Result<()>> + Send;
}
