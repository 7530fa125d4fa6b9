//! Congestion calculator: normalized jam index
//!
//! `jam_index = clamp(1 - mean_speed / free_flow_speed, 0, 1)`.
//! Recomputes its own mean speed rather than reading the kinematics
//! output, keeping the calculator set order-independent.

use contracts::StatisticsResult;

use crate::buffer::StatisticsBuffer;
use crate::calculator::{StepCalculator, StepContext};

/// Default free-flow reference speed (m/s)
pub const DEFAULT_FREE_FLOW_SPEED: f64 = 14.0;

pub struct CongestionCalculator {
    free_flow_speed: f64,
}

impl CongestionCalculator {
    pub fn new(free_flow_speed: f64) -> Self {
        Self {
            free_flow_speed: if free_flow_speed > 0.0 {
                free_flow_speed
            } else {
                DEFAULT_FREE_FLOW_SPEED
            },
        }
    }
}

impl Default for CongestionCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_FLOW_SPEED)
    }
}

impl StepCalculator for CongestionCalculator {
    fn name(&self) -> &'static str {
        "congestion"
    }

    fn apply(
        &self,
        ctx: &StepContext<'_>,
        _buffer: &mut StatisticsBuffer,
        out: &mut StatisticsResult,
    ) {
        let speeds: Vec<f64> = ctx
            .current
            .vehicles
            .iter()
            .map(|v| v.speed)
            .filter(|s| s.is_finite())
            .collect();

        // No valid samples: an empty road is not a jam
        if speeds.is_empty() {
            out.jam_index = 0.0;
            return;
        }

        let mean_speed = speeds.iter().sum::<f64>() / speeds.len() as f64;
        out.jam_index = (1.0 - mean_speed / self.free_flow_speed).clamp(0.0, 1.0);
    }
}
