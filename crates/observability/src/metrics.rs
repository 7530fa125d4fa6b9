//! Per-tick metrics recording and aggregation
//!
//! `record_tick_metrics` feeds the Prometheus exporter; the aggregator
//! keeps an in-memory summary for the end-of-run report.

use contracts::StatisticsResult;
use metrics::{counter, gauge, histogram};

/// Record exporter metrics for one relayed tick.
///
/// Call once per `TickMessage` on the consuming side.
pub fn record_tick_metrics(stats: &StatisticsResult) {
    counter!("traffic_orchestrator_ticks_total").increment(1);

    gauge!("traffic_orchestrator_last_step").set(stats.step as f64);
    gauge!("traffic_orchestrator_car_number").set(stats.car_number as f64);
    gauge!("traffic_orchestrator_jam_index").set(stats.jam_index);

    histogram!("traffic_orchestrator_jam_index_hist").record(stats.jam_index);
    histogram!("traffic_orchestrator_speed_mean_hist").record(stats.speed_mean);

    if stats.car_in > 0 {
        counter!("traffic_orchestrator_car_in_total").increment(stats.car_in);
    }
    if stats.car_out > 0 {
        counter!("traffic_orchestrator_car_out_total").increment(stats.car_out);
    }
}

/// Aggregates per-tick statistics in memory for run summaries
#[derive(Debug, Clone, Default)]
pub struct TickMetricsAggregator {
    /// Ticks observed
    pub total_ticks: u64,

    /// Highest step seen
    pub last_step: u64,

    /// Cumulative arrivals (from the final tick's counters)
    pub total_in: u64,

    /// Cumulative departures (from the final tick's counters)
    pub total_out: u64,

    /// Jam index distribution
    pub jam_stats: RunningStats,

    /// Mean-speed distribution
    pub speed_stats: RunningStats,

    /// Vehicle-count distribution
    pub car_number_stats: RunningStats,
}

impl TickMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick into the aggregate.
    pub fn update(&mut self, stats: &StatisticsResult) {
        self.total_ticks += 1;
        self.last_step = self.last_step.max(stats.step);
        self.total_in = stats.total_in;
        self.total_out = stats.total_out;
        self.jam_stats.push(stats.jam_index);
        self.speed_stats.push(stats.speed_mean);
        self.car_number_stats.push(stats.car_number as f64);
    }

    /// Produce the summary report.
    pub fn summary(&self) -> TickSummary {
        TickSummary {
            total_ticks: self.total_ticks,
            last_step: self.last_step,
            total_in: self.total_in,
            total_out: self.total_out,
            jam_index: StatsSummary::from(&self.jam_stats),
            mean_speed: StatsSummary::from(&self.speed_stats),
            car_number: StatsSummary::from(&self.car_number_stats),
        }
    }

    /// Reset the aggregate.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Aggregated run summary
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub total_ticks: u64,
    pub last_step: u64,
    pub total_in: u64,
    pub total_out: u64,
    pub jam_index: StatsSummary,
    pub mean_speed: StatsSummary,
    pub car_number: StatsSummary,
}

impl std::fmt::Display for TickSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Tick Metrics Summary ===")?;
        writeln!(f, "Ticks: {} (last step {})", self.total_ticks, self.last_step)?;
        writeln!(
            f,
            "Flow: {} in / {} out (cumulative)",
            self.total_in, self.total_out
        )?;
        writeln!(f, "Jam index: {}", self.jam_index)?;
        writeln!(f, "Mean speed (m/s): {}", self.mean_speed)?;
        writeln!(f, "Vehicles per frame: {}", self.car_number)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = TickMetricsAggregator::new();

        let stats = StatisticsResult {
            step: 7,
            speed_mean: 9.0,
            car_in: 1,
            car_out: 1,
            car_number: 8,
            total_in: 9,
            total_out: 1,
            jam_index: 0.35,
            ..Default::default()
        };
        aggregator.update(&stats);

        assert_eq!(aggregator.total_ticks, 1);
        assert_eq!(aggregator.last_step, 7);
        assert_eq!(aggregator.total_in, 9);
        assert!((aggregator.jam_stats.mean() - 0.35).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = TickMetricsAggregator::new();
        for step in 0..10u64 {
            aggregator.update(&StatisticsResult {
                step,
                speed_mean: 10.0,
                car_number: 5,
                total_in: step + 5,
                total_out: step,
                jam_index: 0.2,
                ..Default::default()
            });
        }

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Ticks: 10"));
        assert!(output.contains("14 in / 9 out"));
        assert!(output.contains("n=10"));
    }
}
