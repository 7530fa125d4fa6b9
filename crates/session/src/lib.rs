//! # Session
//!
//! Per-task live sessions: the correlation between one task, one viewer
//! connection, and one engine stream.
//!
//! Responsibilities:
//! - Session lifecycle `Prepared → Bound → Streaming → Closed`, exactly
//!   one session per active task id
//! - The relay task: parse → statistics → viewer push (arrival order,
//!   no duplication) → persistence handoff
//! - Viewer command translation into dispatcher control requests
//! - Idle timeout and prompt shutdown signalling
//!
//! The viewer channel is allocated at `prepare` time, before any engine
//! exists, so a viewer can attach first and never misses the first
//! frames.

mod error;
mod manager;
mod relay;

pub use error::SessionError;
pub use manager::{SessionManager, SessionState};
