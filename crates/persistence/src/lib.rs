//! # Persistence
//!
//! Asynchronous, non-blocking step persistence.
//!
//! Responsibilities:
//! - Consume `StepRecord`s without adding latency to the tick path
//! - Bounded worker pool draining a bounded queue; a full queue makes
//!   the submitting task perform the write itself (measured, never
//!   dropped)
//! - Batch and incremental document modes keyed by task id
//!
//! Storage failures are logged and counted; they never abort a session
//! and are not retried.

mod document_store;
mod metrics;
mod pool;
mod recorder;

pub use document_store::JsonDocumentStore;
pub use metrics::{PersistMetrics, PersistSnapshot};
pub use pool::{WriteJob, WriterHandle, WriterPool};
pub use recorder::TaskRecorder;
