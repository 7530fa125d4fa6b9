//! Raw payload parser
//!
//! Engines disagree on field names ("speed" vs "v" vs "velocity"), so
//! every logical field has an ordered candidate-key list tried in
//! priority order. A frame without a resolvable step counter is
//! unparsable; invalid vehicle/signal entries are skipped and counted
//! without failing the frame.

use contracts::{RawStepPayload, SignalState, StepFrame, VehicleState};
use metrics::counter;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParseError;

const STEP_KEYS: &[&str] = &["step", "tick", "frameId", "frame_id"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "t"];
const VEHICLES_KEYS: &[&str] = &["vehicles", "cars", "vehicleList"];
const SIGNALS_KEYS: &[&str] = &["signals", "lights", "signalList"];

const VEHICLE_ID_KEYS: &[&str] = &["id", "vehicleId", "vid"];
const SPEED_KEYS: &[&str] = &["speed", "v", "velocity"];
const ACCELERATION_KEYS: &[&str] = &["acceleration", "acc", "a"];
const X_KEYS: &[&str] = &["x", "posX"];
const Y_KEYS: &[&str] = &["y", "posY"];

const CROSS_ID_KEYS: &[&str] = &["crossId", "cross_id", "junctionId"];
const PHASE_KEYS: &[&str] = &["phase", "phaseIndex"];
const REMAINING_KEYS: &[&str] = &["remaining", "remainingSecs", "countdown"];

/// First value present under any of the candidate keys
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key))
}

fn pick_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    pick(obj, keys).and_then(Value::as_f64)
}

fn pick_u64(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    pick(obj, keys).and_then(Value::as_u64)
}

fn pick_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    pick(obj, keys).and_then(Value::as_str)
}

/// Parse a raw engine payload into a canonical `StepFrame`.
///
/// The task id comes from the transport envelope, never from the
/// payload body.
pub fn parse_step(raw: &RawStepPayload) -> Result<StepFrame, ParseError> {
    let value: Value = serde_json::from_slice(&raw.body)?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::invalid("payload is not a JSON object"))?;

    let step = pick_u64(obj, STEP_KEYS).ok_or(ParseError::MissingField { field: "step" })?;
    let timestamp = pick_f64(obj, TIMESTAMP_KEYS).unwrap_or(0.0);

    let vehicles = match pick(obj, VEHICLES_KEYS) {
        Some(Value::Array(entries)) => parse_vehicles(&raw.task_id, step, entries),
        Some(_) => {
            return Err(ParseError::invalid("vehicle list is not an array"));
        }
        None => Vec::new(),
    };

    let signals = match pick(obj, SIGNALS_KEYS) {
        Some(Value::Array(entries)) => parse_signals(entries),
        _ => Vec::new(),
    };

    Ok(StepFrame {
        task_id: raw.task_id.clone(),
        step,
        timestamp,
        vehicles,
        signals,
    })
}

fn parse_vehicles(
    task_id: &contracts::TaskId,
    step: u64,
    entries: &[Value],
) -> Vec<VehicleState> {
    let mut vehicles = Vec::with_capacity(entries.len());
    let mut skipped = 0u64;

    for entry in entries {
        match parse_vehicle(entry) {
            Some(vehicle) => vehicles.push(vehicle),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        counter!("traffic_orchestrator_vehicle_entries_skipped_total").increment(skipped);
        debug!(task_id = %task_id, step, skipped, "skipped invalid vehicle entries");
    }

    vehicles
}

/// A vehicle entry needs an id and a finite speed; everything else has
/// safe defaults.
fn parse_vehicle(entry: &Value) -> Option<VehicleState> {
    let obj = entry.as_object()?;
    let id = pick_str(obj, VEHICLE_ID_KEYS)?.to_string();
    let speed = pick_f64(obj, SPEED_KEYS).filter(|s| s.is_finite())?;
    let acceleration = pick_f64(obj, ACCELERATION_KEYS)
        .filter(|a| a.is_finite())
        .unwrap_or(0.0);
    let x = pick_f64(obj, X_KEYS).unwrap_or(0.0);
    let y = pick_f64(obj, Y_KEYS).unwrap_or(0.0);

    Some(VehicleState {
        id,
        speed,
        acceleration,
        x,
        y,
    })
}

fn parse_signals(entries: &[Value]) -> Vec<SignalState> {
    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            Some(SignalState {
                cross_id: pick_str(obj, CROSS_ID_KEYS)?.to_string(),
                phase: pick_u64(obj, PHASE_KEYS).unwrap_or(0) as u32,
                remaining_secs: pick_f64(obj, REMAINING_KEYS).unwrap_or(0.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TaskId;

    fn raw(body: &str) -> RawStepPayload {
        RawStepPayload::new(TaskId::from("t1"), body.to_string())
    }

    #[test]
    fn test_canonical_keys() {
        let frame = parse_step(&raw(
            r#"{"step": 3, "timestamp": 0.15,
                "vehicles": [{"id": "v1", "speed": 12.0, "acceleration": 0.5, "x": 1.0, "y": 2.0}],
                "signals": [{"crossId": "c1", "phase": 1, "remaining": 8.5}]}"#,
        ))
        .unwrap();

        assert_eq!(frame.task_id, "t1");
        assert_eq!(frame.step, 3);
        assert_eq!(frame.vehicles.len(), 1);
        assert_eq!(frame.vehicles[0].speed, 12.0);
        assert_eq!(frame.signals[0].cross_id, "c1");
    }

    #[test]
    fn test_vendor_aliases() {
        let frame = parse_step(&raw(
            r#"{"tick": 9, "t": 0.45,
                "cars": [{"vehicleId": "v7", "v": 6.5, "acc": -0.2}],
                "lights": [{"junctionId": "c2", "phaseIndex": 3, "countdown": 2.0}]}"#,
        ))
        .unwrap();

        assert_eq!(frame.step, 9);
        assert_eq!(frame.timestamp, 0.45);
        assert_eq!(frame.vehicles[0].id, "v7");
        assert_eq!(frame.vehicles[0].speed, 6.5);
        assert_eq!(frame.vehicles[0].acceleration, -0.2);
        assert_eq!(frame.signals[0].phase, 3);
    }

    #[test]
    fn test_alias_priority_order() {
        // Both "speed" and "v" present: the canonical key wins
        let frame = parse_step(&raw(
            r#"{"step": 0, "vehicles": [{"id": "v1", "speed": 10.0, "v": 99.0}]}"#,
        ))
        .unwrap();
        assert_eq!(frame.vehicles[0].speed, 10.0);
    }

    #[test]
    fn test_missing_step_is_unparsable() {
        let err = parse_step(&raw(r#"{"vehicles": []}"#)).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "step" }));
    }

    #[test]
    fn test_non_object_payload() {
        let err = parse_step(&raw("[1, 2, 3]")).unwrap_err();
        assert!(matches!(err, ParseError::Invalid { .. }));
    }

    #[test]
    fn test_garbage_payload() {
        let err = parse_step(&raw("not json at all")).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_invalid_vehicle_entries_skipped() {
        let frame = parse_step(&raw(
            r#"{"step": 1, "vehicles": [
                {"id": "ok", "speed": 5.0},
                {"id": "no-speed"},
                {"speed": 5.0},
                42
            ]}"#,
        ))
        .unwrap();
        assert_eq!(frame.vehicles.len(), 1);
        assert_eq!(frame.vehicles[0].id, "ok");
    }

    #[test]
    fn test_missing_vehicle_list_is_empty_frame() {
        let frame = parse_step(&raw(r#"{"step": 5}"#)).unwrap();
        assert!(frame.vehicles.is_empty());
        assert!(frame.signals.is_empty());
    }
}
