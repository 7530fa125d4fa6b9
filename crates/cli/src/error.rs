//! Error types for the orchestrator control surface.

use contracts::{ContractError, TaskId};
use dispatcher::DispatchError;
use session::SessionError;
use thiserror::Error;

/// Control-surface errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Operation on a task this orchestrator has never prepared
    #[error("task '{task_id}' not found")]
    TaskNotFound { task_id: TaskId },

    /// Dispatch failure (engine unavailable/unreachable, bad control value)
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Session lifecycle failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Metadata store, map resolution, or other contract failure
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Result type alias for control-surface operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
