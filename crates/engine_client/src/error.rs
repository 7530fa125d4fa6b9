//! Engine client error types

use contracts::{ContractError, TaskId};
use thiserror::Error;

/// Errors surfaced by engine control calls
#[derive(Debug, Error)]
pub enum EngineClientError {
    /// Peer could not be reached; the caller must mark the instance
    /// unreachable (no transport-level retry is assumed)
    #[error("engine transport failure: {message}")]
    Transport { message: String },

    /// Control call for a task this engine is not running
    #[error("task '{task_id}' is not running on this engine")]
    TaskUnknown { task_id: TaskId },

    /// Duplicate submission of a task already running here
    #[error("task '{task_id}' is already running on this engine")]
    AlreadyRunning { task_id: TaskId },

    /// The engine refused the submission
    #[error("submission rejected: {message}")]
    Rejected { message: String },
}

impl EngineClientError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether the failure invalidates the instance
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<EngineClientError> for ContractError {
    fn from(err: EngineClientError) -> Self {
        match err {
            EngineClientError::Transport { message } => ContractError::transport("engine", message),
            EngineClientError::TaskUnknown { task_id } => {
                ContractError::state(task_id.as_str(), "task not running on engine")
            }
            EngineClientError::AlreadyRunning { task_id } => {
                ContractError::state(task_id.as_str(), "task already running on engine")
            }
            EngineClientError::Rejected { message } => {
                ContractError::state("engine", format!("submission rejected: {message}"))
            }
        }
    }
}

/// Engine client Result alias
pub type Result<T> = std::result::Result<T, EngineClientError>;
