//! Per-session statistics buffer
//!
//! Two horizons live side by side: cumulative in/out counters that
//! accumulate for the whole session, and a bounded FIFO window of the
//! most recent per-tick flow samples for short-horizon averages. The
//! buffer is owned by its session's relay task; only the flow calculator
//! writes it.

use contracts::FlowSample;
use ringbuf::{traits::*, HeapRb};

/// Sliding window + cumulative flow counters for one session
pub struct StatisticsBuffer {
    window: HeapRb<FlowSample>,
    window_size: usize,
    total_in: u64,
    total_out: u64,
}

impl std::fmt::Debug for StatisticsBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsBuffer")
            .field("window_len", &self.window.occupied_len())
            .field("window_size", &self.window_size)
            .field("total_in", &self.total_in)
            .field("total_out", &self.total_out)
            .finish()
    }
}

impl StatisticsBuffer {
    /// Create a buffer with the given window length (ticks).
    pub fn new(window_size: usize) -> Self {
        Self {
            window: HeapRb::new(window_size.max(1)),
            window_size: window_size.max(1),
            total_in: 0,
            total_out: 0,
        }
    }

    /// Record one tick's flow: bump the cumulative counters and push the
    /// sample, evicting the oldest one once the window is full.
    pub fn record_flow(&mut self, sample: FlowSample) {
        self.total_in += sample.car_in;
        self.total_out += sample.car_out;

        if self.window.is_full() {
            let _ = self.window.try_pop();
        }
        let _ = self.window.try_push(sample);
    }

    /// Cumulative arrivals since session start (never reset).
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Cumulative departures since session start (never reset).
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Samples currently retained in the window.
    pub fn window_len(&self) -> usize {
        self.window.occupied_len()
    }

    /// Configured window capacity.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Mean per-tick arrivals over the retained window.
    pub fn window_in_rate(&self) -> f64 {
        self.window_mean(|s| s.car_in)
    }

    /// Mean per-tick departures over the retained window.
    pub fn window_out_rate(&self) -> f64 {
        self.window_mean(|s| s.car_out)
    }

    fn window_mean(&self, field: impl Fn(&FlowSample) -> u64) -> f64 {
        let len = self.window.occupied_len();
        if len == 0 {
            return 0.0;
        }
        let sum: u64 = self.window.iter().map(|s| field(s)).sum();
        sum as f64 / len as f64
    }
}
