//! Synthetic traffic payload generation for the mock engine
//!
//! Produces the loosely-typed JSON documents a real engine would stream.
//! Vehicle ids cycle by one per tick (one arrival, one departure), which
//! gives the flow calculators predictable in/out counts.

use bytes::Bytes;
use contracts::TaskId;
use serde_json::json;

/// Build the raw payload for one tick.
///
/// Vehicle ids at step `s` are `v{s}..v{s+n-1}`; speeds oscillate around
/// 10 m/s so the congestion index stays strictly inside (0, 1).
pub fn step_payload(task_id: &TaskId, step: u64, sim_time: f64, vehicles: usize) -> Bytes {
    let vehicles: Vec<_> = (0..vehicles as u64)
        .map(|i| {
            let vid = step + i;
            let phase = (step as f64) * 0.31 + (i as f64) * 0.7;
            json!({
                "id": format!("v{vid}"),
                "speed": 10.0 + 3.0 * phase.sin(),
                "acceleration": 0.9 * phase.cos(),
                "x": (vid as f64) * 7.5,
                "y": (i as f64) * 3.5,
            })
        })
        .collect();

    let body = json!({
        "taskId": task_id.as_str(),
        "step": step,
        "timestamp": sim_time,
        "vehicles": vehicles,
        "signals": [{
            "crossId": "cross-1",
            "phase": (step / 10) % 4,
            "remaining": 10.0 - (step % 10) as f64,
        }],
    });

    Bytes::from(body.to_string())
}
