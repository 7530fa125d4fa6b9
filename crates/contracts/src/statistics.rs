//! StatisticsResult - derived per-step metrics
//!
//! One result per relayed frame. Fields are partitioned between the
//! calculators (kinematics / flow / congestion); no calculator reads
//! another's output within the same step.

use serde::{Deserialize, Serialize};

/// Computed statistics for one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResult {
    pub step: u64,

    // ===== Kinematics (current frame only) =====
    pub speed_min: f64,
    pub speed_max: f64,
    pub speed_mean: f64,
    pub acceleration_min: f64,
    pub acceleration_max: f64,
    pub acceleration_mean: f64,

    // ===== Flow =====
    /// Vehicles that appeared since the previous frame
    pub car_in: u64,

    /// Vehicles that disappeared since the previous frame
    pub car_out: u64,

    /// Vehicles present in the current frame
    pub car_number: u64,

    /// Cumulative arrivals over the session lifetime
    pub total_in: u64,

    /// Cumulative departures over the session lifetime
    pub total_out: u64,

    /// Mean per-tick arrivals over the sliding window
    pub window_in_rate: f64,

    /// Mean per-tick departures over the sliding window
    pub window_out_rate: f64,

    // ===== Congestion =====
    /// Normalized congestion index in [0, 1]
    pub jam_index: f64,
}

/// One sliding-window flow sample (per tick)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSample {
    pub step: u64,
    pub car_in: u64,
    pub car_out: u64,
}
