//! Run statistics and summary reporting.

use std::time::Duration;

use contracts::TaskStatus;
use observability::TickMetricsAggregator;
use persistence::PersistSnapshot;

/// Statistics from one orchestrated run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Per-tick aggregate from the viewer stream
    pub ticks: TickMetricsAggregator,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Final persistence counters
    pub persist: PersistSnapshot,

    /// Registered engine instances
    pub engines: usize,

    /// Task status after the run
    pub final_status: Option<TaskStatus>,
}

impl RunStats {
    /// Ticks relayed per second
    pub fn tps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks.total_ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let summary = self.ticks.summary();

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Run Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks relayed: {}", summary.total_ticks);
        println!("   ├─ Last step: {}", summary.last_step);
        println!("   ├─ Ticks/sec: {:.2}", self.tps());
        println!("   ├─ Engines: {}", self.engines);
        match self.final_status {
            Some(status) => println!("   └─ Final status: {status}"),
            None => println!("   └─ Final status: unknown"),
        }

        println!("\n🚦 Traffic");
        println!(
            "   ├─ Flow: {} in / {} out (cumulative)",
            summary.total_in, summary.total_out
        );
        println!("   ├─ Vehicles per frame: {}", summary.car_number);
        println!("   ├─ Mean speed (m/s): {}", summary.mean_speed);
        println!("   └─ Jam index: {}", summary.jam_index);

        println!("\n💾 Persistence");
        println!("   ├─ Writes: {}", self.persist.write_count);
        println!("   ├─ Failures: {}", self.persist.failure_count);
        println!(
            "   └─ Sync-fallback writes: {}",
            self.persist.sync_fallback_writes
        );

        println!();
    }
}
