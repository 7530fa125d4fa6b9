//! Dispatcher error types

use contracts::{ContractError, InstanceId, TaskId};
use engine_client::EngineClientError;
use thiserror::Error;

/// Dispatch-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered instance is eligible for a new task
    #[error("no eligible engine instance available")]
    EngineUnavailable,

    /// The instance bound to a task is gone or unreachable
    #[error("engine instance '{instance_id}' unreachable: {message}")]
    EngineUnreachable {
        instance_id: InstanceId,
        message: String,
    },

    /// Command for an unknown or already finished task
    #[error("task '{task_id}' not found")]
    TaskNotFound { task_id: TaskId },

    /// Second submission while a task is bound (single-writer rule)
    #[error("task '{task_id}' is already bound to instance '{instance_id}'")]
    AlreadyRunning {
        task_id: TaskId,
        instance_id: InstanceId,
    },

    /// Out-of-range control value
    #[error("invalid control value for '{field}': {message}")]
    InvalidControl { field: String, message: String },

    /// Engine-side rejection that is not a transport failure
    #[error("engine rejected call: {0}")]
    Engine(#[from] EngineClientError),

    /// Metadata store or other contract failure
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DispatchError {
    pub fn unreachable(instance_id: InstanceId, message: impl Into<String>) -> Self {
        Self::EngineUnreachable {
            instance_id,
            message: message.into(),
        }
    }

    pub fn invalid_control(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidControl {
            field: field.into(),
            message: message.into(),
        }
    }
}
