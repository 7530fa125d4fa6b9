//! Kinematics calculator: per-frame speed/acceleration extrema and means

use contracts::{StatisticsResult, StepFrame};

use crate::buffer::StatisticsBuffer;
use crate::calculator::{StepCalculator, StepContext};

/// Min/max/mean of speed and acceleration over the current frame only
pub struct KinematicsCalculator;

/// (min, max, mean) of a sample set; all zeros for an empty set, never NaN
fn extrema_and_mean(samples: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0u64;

    for value in samples.filter(|v| v.is_finite()) {
        min = min.min(value);
        max = max.max(value);
        sum += value;
        count += 1;
    }

    if count == 0 {
        (0.0, 0.0, 0.0)
    } else {
        (min, max, sum / count as f64)
    }
}

impl StepCalculator for KinematicsCalculator {
    fn name(&self) -> &'static str {
        "kinematics"
    }

    fn apply(
        &self,
        ctx: &StepContext<'_>,
        _buffer: &mut StatisticsBuffer,
        out: &mut StatisticsResult,
    ) {
        let frame: &StepFrame = ctx.current;

        let (min, max, mean) = extrema_and_mean(frame.vehicles.iter().map(|v| v.speed));
        out.speed_min = min;
        out.speed_max = max;
        out.speed_mean = mean;

        let (min, max, mean) = extrema_and_mean(frame.vehicles.iter().map(|v| v.acceleration));
        out.acceleration_min = min;
        out.acceleration_max = max;
        out.acceleration_mean = mean;
    }
}
