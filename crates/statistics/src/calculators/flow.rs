//! Flow calculator: per-tick in/out counts, cumulative totals, and
//! short-horizon window rates
//!
//! The only calculator that writes the shared buffer.

use std::collections::HashSet;

use contracts::{FlowSample, StatisticsResult};

use crate::buffer::StatisticsBuffer;
use crate::calculator::{StepCalculator, StepContext};

/// Vehicle-id set difference counts between consecutive frames
pub struct FlowCalculator;

impl StepCalculator for FlowCalculator {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn apply(
        &self,
        ctx: &StepContext<'_>,
        buffer: &mut StatisticsBuffer,
        out: &mut StatisticsResult,
    ) {
        let current: HashSet<&str> = ctx
            .current
            .vehicles
            .iter()
            .map(|v| v.id.as_str())
            .collect();

        let previous: HashSet<&str> = ctx
            .previous
            .map(|frame| frame.vehicles.iter().map(|v| v.id.as_str()).collect())
            .unwrap_or_default();

        let car_in = current.difference(&previous).count() as u64;
        let car_out = previous.difference(&current).count() as u64;

        buffer.record_flow(FlowSample {
            step: ctx.current.step,
            car_in,
            car_out,
        });

        out.car_in = car_in;
        out.car_out = car_out;
        out.car_number = current.len() as u64;
        out.total_in = buffer.total_in();
        out.total_out = buffer.total_out();
        out.window_in_rate = buffer.window_in_rate();
        out.window_out_rate = buffer.window_out_rate();
    }
}
