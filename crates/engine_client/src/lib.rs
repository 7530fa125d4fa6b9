//! # Engine Client
//!
//! Client side of the remote engine contract.
//!
//! Responsibilities:
//! - `EngineControl`: the typed request surface an orchestrator uses to
//!   drive one engine instance (submit, step/status control, signal and
//!   vehicle-model changes)
//! - `MockEngineClient`: deterministic in-process engine for development
//!   and tests, with failure injection
//!
//! Per-tick output flows back through the `StepCallback` handed to
//! `submit_task`; status changes flow through `EngineEvents`.

mod client;
mod error;
mod mock_client;
mod mock_traffic;

pub use client::EngineControl;
pub use error::{EngineClientError, Result};
pub use mock_client::{ControlCall, MockEngineClient, MockEngineSettings};
pub use mock_traffic::step_payload;
