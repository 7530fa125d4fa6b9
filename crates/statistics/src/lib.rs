//! # Statistics
//!
//! Per-step statistics pipeline: parse → calculate → aggregate.
//!
//! Responsibilities:
//! - Normalize loosely-typed engine payloads into `StepFrame`s
//! - Run a fixed, order-independent set of calculators per step
//! - Maintain the per-session sliding-window buffer and cumulative
//!   flow counters
//!
//! The pipeline is owned by exactly one session's relay task; nothing in
//! this crate takes a lock.

mod buffer;
mod calculator;
mod calculators;
mod error;
pub mod parser;

pub use buffer::StatisticsBuffer;
pub use calculator::{CalculatorRegistry, StatisticsPipeline, StepCalculator, StepContext};
pub use calculators::{CongestionCalculator, FlowCalculator, KinematicsCalculator};
pub use error::ParseError;
pub use parser::parse_step;
