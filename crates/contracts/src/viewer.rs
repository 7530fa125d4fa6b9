//! Viewer wire contract and session control messages
//!
//! Data direction is server-push only: one `TickMessage` per simulation
//! tick, in the exact order frames arrived from the engine. The client
//! pushes `ViewerCommand`s, which the session translates into dispatcher
//! control requests.

use serde::{Deserialize, Serialize};

use crate::{
    SignalPlan, StatisticsResult, StepFrame, TaskId, VehicleFollowingModel, VehicleGeneratingModel,
};

/// One per-tick message pushed to the viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickMessage {
    pub frame: StepFrame,
    pub stats: StatisticsResult,
}

/// Control message pushed by a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerCommand {
    Pause,
    Resume,
    SetStep { step: u64 },
    ControlGreenRatio { percent: u8 },
    ChangeSignalPlan { plan: SignalPlan },
    Stop,
}

/// Control operation routed from a session to the dispatcher
///
/// `Completed` and `TimedOut` are session lifecycle reports rather than
/// viewer commands; carrying them on the same channel keeps every status
/// transition on the dispatcher's single-writer path.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOp {
    Pause,
    Resume,
    SetStep(u64),
    GreenRatio(u8),
    SignalPlan(SignalPlan),
    GeneratingModel(VehicleGeneratingModel),
    FollowingModel(VehicleFollowingModel),
    Stop,
    Completed,
    TimedOut,
}

/// A control operation bound to its task
#[derive(Debug, Clone)]
pub struct ControlRequest {
    pub task_id: TaskId,
    pub op: ControlOp,
}

impl ControlRequest {
    pub fn new(task_id: TaskId, op: ControlOp) -> Self {
        Self { task_id, op }
    }

    /// Translate a viewer command into the dispatcher operation it maps to.
    pub fn from_viewer(task_id: TaskId, cmd: ViewerCommand) -> Self {
        let op = match cmd {
            ViewerCommand::Pause => ControlOp::Pause,
            ViewerCommand::Resume => ControlOp::Resume,
            ViewerCommand::SetStep { step } => ControlOp::SetStep(step),
            ViewerCommand::ControlGreenRatio { percent } => ControlOp::GreenRatio(percent),
            ViewerCommand::ChangeSignalPlan { plan } => ControlOp::SignalPlan(plan),
            ViewerCommand::Stop => ControlOp::Stop,
        };
        Self { task_id, op }
    }
}
