//! # Dispatcher
//!
//! Engine registry and task dispatch.
//!
//! Responsibilities:
//! - Track live engine instances (registration, heartbeat, stale eviction)
//! - Select an instance and submit tasks (first-available policy)
//! - Forward control commands to the instance bound to a task
//! - Own every task-status transition (single writer per task id)

mod dispatcher;
mod error;
mod memory_meta;
mod registry;

pub use dispatcher::TaskDispatcher;
pub use error::DispatchError;
pub use memory_meta::InMemoryTaskStore;
pub use registry::{Availability, EngineInstance, EngineRegistry};
