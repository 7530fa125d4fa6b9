//! StepFrame - one simulation tick of engine output
//!
//! Raw payloads arrive as loosely-typed bytes and are normalized into
//! `StepFrame` by the statistics parser before anything downstream sees
//! them. A frame is immutable after parsing.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::TaskId;

/// Unparsed per-tick payload as received from an engine
#[derive(Debug, Clone)]
pub struct RawStepPayload {
    pub task_id: TaskId,

    /// Engine wire payload (JSON document, zero-copy)
    pub body: Bytes,
}

impl RawStepPayload {
    pub fn new(task_id: TaskId, body: impl Into<Bytes>) -> Self {
        Self {
            task_id,
            body: body.into(),
        }
    }
}

/// Canonical per-tick frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFrame {
    pub task_id: TaskId,

    /// Tick counter, monotonic non-decreasing per task
    pub step: u64,

    /// Engine simulation time (seconds)
    pub timestamp: f64,

    pub vehicles: Vec<VehicleState>,

    #[serde(default)]
    pub signals: Vec<SignalState>,
}

/// Per-vehicle state within one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: String,

    /// m/s
    pub speed: f64,

    /// m/s²
    pub acceleration: f64,

    pub x: f64,
    pub y: f64,
}

/// Per-signal state within one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalState {
    /// Crossing/junction identifier
    pub cross_id: String,

    /// Active phase index within the current plan
    pub phase: u32,

    /// Seconds until the next phase switch
    pub remaining_secs: f64,
}
