//! Calculator trait, registry, and the per-session pipeline
//!
//! Calculators are order-independent: each writes a disjoint subset of
//! `StatisticsResult` fields and never reads another's current-step
//! output. The shared buffer is written by exactly one calculator (flow),
//! which is what makes the set safe to reorder.

use contracts::{StatisticsConfig, StatisticsResult, StepFrame};

use crate::buffer::StatisticsBuffer;
use crate::calculators::{CongestionCalculator, FlowCalculator, KinematicsCalculator};

/// Input visible to every calculator for one step
pub struct StepContext<'a> {
    pub current: &'a StepFrame,
    pub previous: Option<&'a StepFrame>,
}

/// One statistics calculator
pub trait StepCalculator: Send {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Fill this calculator's fields of `out` for the current step.
    fn apply(&self, ctx: &StepContext<'_>, buffer: &mut StatisticsBuffer, out: &mut StatisticsResult);
}

/// Fixed set of calculators applied to every step
pub struct CalculatorRegistry {
    calculators: Vec<Box<dyn StepCalculator>>,
}

impl CalculatorRegistry {
    /// The standard set: kinematics, flow, congestion.
    pub fn standard(config: &StatisticsConfig) -> Self {
        Self {
            calculators: vec![
                Box::new(KinematicsCalculator),
                Box::new(FlowCalculator),
                Box::new(CongestionCalculator::new(config.free_flow_speed_mps)),
            ],
        }
    }

    /// Empty registry for custom builds.
    pub fn empty() -> Self {
        Self {
            calculators: Vec::new(),
        }
    }

    /// Add a calculator. Output fields must stay disjoint with the
    /// existing set.
    pub fn with(mut self, calculator: Box<dyn StepCalculator>) -> Self {
        self.calculators.push(calculator);
        self
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}

/// Per-session statistics pipeline
///
/// Owns the buffer and the previous frame; produces exactly one merged
/// `StatisticsResult` per processed step.
pub struct StatisticsPipeline {
    registry: CalculatorRegistry,
    buffer: StatisticsBuffer,
    previous: Option<StepFrame>,
}

impl StatisticsPipeline {
    pub fn new(config: &StatisticsConfig) -> Self {
        Self {
            registry: CalculatorRegistry::standard(config),
            buffer: StatisticsBuffer::new(config.window_size),
            previous: None,
        }
    }

    /// Pipeline with a custom calculator set.
    pub fn with_registry(registry: CalculatorRegistry, window_size: usize) -> Self {
        Self {
            registry,
            buffer: StatisticsBuffer::new(window_size),
            previous: None,
        }
    }

    /// Run all calculators over one frame and merge their outputs.
    pub fn process(&mut self, frame: &StepFrame) -> StatisticsResult {
        let mut out = StatisticsResult {
            step: frame.step,
            ..Default::default()
        };

        let ctx = StepContext {
            current: frame,
            previous: self.previous.as_ref(),
        };
        for calculator in &self.registry.calculators {
            calculator.apply(&ctx, &mut self.buffer, &mut out);
        }

        self.previous = Some(frame.clone());
        out
    }

    pub fn buffer(&self) -> &StatisticsBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::VehicleState;

    fn vehicle(id: &str, speed: f64) -> VehicleState {
        VehicleState {
            id: id.to_string(),
            speed,
            acceleration: 0.0,
            x: 0.0,
            y: 0.0,
        }
    }

    fn frame(step: u64, ids: &[(&str, f64)]) -> StepFrame {
        StepFrame {
            task_id: "t1".into(),
            step,
            timestamp: step as f64 * 0.1,
            vehicles: ids.iter().map(|(id, s)| vehicle(id, *s)).collect(),
            signals: vec![],
        }
    }

    #[test]
    fn test_pipeline_merges_all_calculator_outputs() {
        let mut pipeline = StatisticsPipeline::new(&StatisticsConfig::default());

        let result = pipeline.process(&frame(0, &[("v1", 7.0), ("v2", 7.0)]));
        assert_eq!(result.step, 0);
        // Kinematics fields
        assert_eq!(result.speed_mean, 7.0);
        // Flow fields (first frame: everything is an arrival)
        assert_eq!(result.car_in, 2);
        assert_eq!(result.car_out, 0);
        assert_eq!(result.car_number, 2);
        // Congestion fields
        assert!((result.jam_index - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pipeline_tracks_previous_frame() {
        let mut pipeline = StatisticsPipeline::new(&StatisticsConfig::default());
        pipeline.process(&frame(0, &[("v1", 10.0), ("v2", 10.0), ("v3", 10.0)]));
        let result = pipeline.process(&frame(1, &[("v2", 10.0), ("v3", 10.0), ("v4", 10.0)]));

        assert_eq!(result.car_in, 1);
        assert_eq!(result.car_out, 1);
        assert_eq!(result.car_number, 3);
        assert_eq!(result.total_in, 4); // 3 initial + v4
        assert_eq!(result.total_out, 1); // v1
    }

    #[test]
    fn test_empty_registry_yields_defaults() {
        let mut pipeline = StatisticsPipeline::with_registry(CalculatorRegistry::empty(), 10);
        let result = pipeline.process(&frame(3, &[("v1", 5.0)]));
        assert_eq!(result.step, 3);
        assert_eq!(result.car_number, 0);
        assert_eq!(result.speed_mean, 0.0);
    }

    #[test]
    fn test_custom_registry_composition() {
        let registry = CalculatorRegistry::empty()
            .with(Box::new(KinematicsCalculator))
            .with(Box::new(FlowCalculator));
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());

        let mut pipeline = StatisticsPipeline::with_registry(registry, 10);
        let result = pipeline.process(&frame(0, &[("v1", 6.0)]));
        // Configured calculators ran, congestion stayed at its default
        assert_eq!(result.speed_mean, 6.0);
        assert_eq!(result.car_number, 1);
        assert_eq!(result.jam_index, 0.0);
    }
}
