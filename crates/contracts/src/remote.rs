//! Remote callback contracts between orchestrator and engine processes
//!
//! The request/response direction (`EngineControl`) lives in the
//! `engine_client` crate next to its implementations; this module defines
//! what crosses the boundary in the other direction, plus the streaming
//! callback type shared by both sides.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{InstanceId, RawStepPayload, TaskId, TaskStatus};

/// Per-tick streaming callback
///
/// An engine pushes one `RawStepPayload` per tick through this callback.
/// `Arc` so the same callback can be shared with the engine's tick loop.
pub type StepCallback = Arc<dyn Fn(RawStepPayload) + Send + Sync>;

/// Engine → orchestrator notifications
///
/// Delivery is at-most-once; implementations must be idempotent. A lost
/// `task_status_changed` is recovered by the session observing the end of
/// the frame stream.
pub trait EngineEvents: Send + Sync {
    /// A new engine instance announced itself (or refreshed its lease).
    fn instance_available(&self, instance_id: &InstanceId, addresses: &[String]);

    /// The engine-side status of a task changed.
    fn task_status_changed(&self, task_id: &TaskId, status: TaskStatus);
}

/// Acknowledgement returned by a successful task submission
#[derive(Debug, Clone)]
pub struct SubmitAck {
    pub task_id: TaskId,
    pub instance_id: InstanceId,
    pub accepted_at: DateTime<Utc>,
}
