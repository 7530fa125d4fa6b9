//! Session error types

use contracts::TaskId;
use thiserror::Error;

/// Session-manager errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// `prepare` called for a task that already has a session
    #[error("session for task '{task_id}' already exists")]
    AlreadyPrepared { task_id: TaskId },

    /// Operation on a task with no session (or an already closed one)
    #[error("no session for task '{task_id}'")]
    NotFound { task_id: TaskId },

    /// `bind_engine` called twice for the same session
    #[error("session for task '{task_id}' is already bound to an engine")]
    AlreadyBound { task_id: TaskId },

    /// The viewer receiver was already handed out
    #[error("viewer for task '{task_id}' is already attached")]
    ViewerTaken { task_id: TaskId },
}
