//! SimulationTask - task metadata and engine control payloads

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractError, OwnerId, TaskId};

/// Task lifecycle status
///
/// Mutated only by the dispatcher and the session manager (single writer
/// per task id), in response to callbacks or explicit control calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Finished,
}

impl TaskStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Finished)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

/// Engine-facing task configuration
///
/// Opaque to the orchestrator beyond the map reference: the engine owns
/// the semantics of `params`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Map identifier, resolved to a file path before submission
    pub map_id: String,

    /// Expected number of steps (None = run until stopped)
    #[serde(default)]
    pub total_steps: Option<u64>,

    /// Free-form engine parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// A long-running simulation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationTask {
    pub task_id: TaskId,
    pub owner_id: OwnerId,

    /// Resolved map file path passed through to the engine
    pub map_path: String,

    pub config: TaskConfig,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SimulationTask {
    /// Create a task in `Created` status.
    pub fn new(task_id: TaskId, owner_id: OwnerId, map_path: String, config: TaskConfig) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            owner_id,
            map_path,
            config,
            status: TaskStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, refreshing `updated_at`.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Signal-plan change forwarded to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPlan {
    /// Crossing/junction identifier
    pub cross_id: String,

    /// Cycle length in seconds
    pub cycle_secs: u32,

    /// Per-phase share of the cycle, percent; must sum to 100
    pub phase_splits: Vec<u32>,
}

impl SignalPlan {
    /// Reject plans an engine could not schedule.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.cycle_secs == 0 {
            return Err(ContractError::validation("cycle_secs", "cycle must be > 0"));
        }
        if self.phase_splits.is_empty() {
            return Err(ContractError::validation(
                "phase_splits",
                "at least one phase required",
            ));
        }
        let sum: u32 = self.phase_splits.iter().sum();
        if sum != 100 {
            return Err(ContractError::validation(
                "phase_splits",
                format!("splits must sum to 100, got {sum}"),
            ));
        }
        Ok(())
    }
}

/// Vehicle arrival model selection, forwarded verbatim to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleGeneratingModel {
    pub name: String,

    #[serde(default)]
    pub params: HashMap<String, f64>,
}

/// Car-following model selection, forwarded verbatim to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleFollowingModel {
    pub name: String,

    #[serde(default)]
    pub params: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Stopped.is_terminal());
        assert!(TaskStatus::Finished.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Created.is_terminal());
    }

    #[test]
    fn test_set_status_touches_updated_at() {
        let mut task = SimulationTask::new(
            "t1".into(),
            "owner".into(),
            "/maps/town.net".to_string(),
            TaskConfig::default(),
        );
        let before = task.updated_at;
        task.set_status(TaskStatus::Running);
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.updated_at >= before);
    }

    #[test]
    fn test_signal_plan_validation() {
        let plan = SignalPlan {
            cross_id: "cross-3".to_string(),
            cycle_secs: 90,
            phase_splits: vec![40, 30, 30],
        };
        assert!(plan.validate().is_ok());

        let bad = SignalPlan {
            cross_id: "cross-3".to_string(),
            cycle_secs: 90,
            phase_splits: vec![50, 30],
        };
        assert!(matches!(
            bad.validate(),
            Err(ContractError::Validation { .. })
        ));

        let zero_cycle = SignalPlan {
            cross_id: "cross-3".to_string(),
            cycle_secs: 0,
            phase_splits: vec![100],
        };
        assert!(zero_cycle.validate().is_err());
    }
}
