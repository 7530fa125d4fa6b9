//! OrchestratorConfig - Config Loader output
//!
//! Describes the full orchestrator deployment: session policy, statistics
//! tuning, persistence mode, registry policy, and the engine instances to
//! register at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct OrchestratorConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Session policy
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    /// Statistics pipeline tuning
    #[serde(default)]
    #[validate(nested)]
    pub statistics: StatisticsConfig,

    /// Async persistence policy
    #[serde(default)]
    #[validate(nested)]
    pub persistence: PersistenceConfig,

    /// Engine registry policy
    #[serde(default)]
    #[validate(nested)]
    pub registry: RegistryConfig,

    /// Engine instances registered at startup (mock mode)
    #[serde(default)]
    #[validate(nested)]
    pub engines: Vec<EngineConfig>,
}

/// Session manager policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Seconds without frames or commands before a session is force-closed
    #[serde(default = "default_idle_timeout_secs")]
    #[validate(range(min = 1))]
    pub idle_timeout_secs: u64,

    /// Viewer channel capacity (frames buffered before the viewer attaches)
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1))]
    pub viewer_channel_capacity: usize,

    /// Engine ingress channel capacity
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1))]
    pub engine_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            viewer_channel_capacity: default_channel_capacity(),
            engine_channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_channel_capacity() -> usize {
    256
}

/// Statistics pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StatisticsConfig {
    /// Sliding-window length in ticks (short-horizon flow averages)
    #[serde(default = "default_window_size")]
    #[validate(range(min = 1))]
    pub window_size: usize,

    /// Free-flow reference speed for the congestion index (m/s)
    #[serde(default = "default_free_flow_speed")]
    #[validate(range(min = 0.1))]
    pub free_flow_speed_mps: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            free_flow_speed_mps: default_free_flow_speed(),
        }
    }
}

fn default_window_size() -> usize {
    100
}

fn default_free_flow_speed() -> f64 {
    14.0
}

/// Persistence mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Buffer all steps, write one document at session close
    Batch,

    /// Upsert-and-push each step as it arrives
    #[default]
    Incremental,
}

/// Async persistence policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub mode: PersistenceMode,

    /// Base directory for task documents
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Writer queue capacity; a full queue makes the submitting task
    /// perform the write itself instead of dropping it
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Worker task count (0 = half of available parallelism)
    #[serde(default)]
    pub workers: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            mode: PersistenceMode::default(),
            base_path: default_base_path(),
            queue_capacity: default_queue_capacity(),
            workers: 0,
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./task_data")
}

fn default_queue_capacity() -> usize {
    256
}

/// Engine registry policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegistryConfig {
    /// Seconds since last heartbeat before an instance is evicted
    #[serde(default = "default_stale_timeout_secs")]
    #[validate(range(min = 1))]
    pub stale_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stale_timeout_secs: default_stale_timeout_secs(),
        }
    }
}

fn default_stale_timeout_secs() -> u64 {
    60
}

/// One engine instance to register at startup
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Unique instance identifier
    #[validate(length(min = 1))]
    pub instance_id: String,

    /// Reachable addresses; at least one is required for dispatch
    #[validate(length(min = 1))]
    pub addresses: Vec<String>,

    /// Mock pacing: milliseconds per tick
    #[serde(default = "default_tick_interval_ms")]
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,

    /// Mock traffic: vehicles present in every frame
    #[serde(default = "default_vehicles_per_frame")]
    #[validate(range(min = 1))]
    pub vehicles_per_frame: usize,

    /// Free-form engine attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_vehicles_per_frame() -> usize {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert_eq!(config.statistics.window_size, 100);
        assert_eq!(config.statistics.free_flow_speed_mps, 14.0);
        assert_eq!(config.persistence.mode, PersistenceMode::Incremental);
        assert_eq!(config.persistence.queue_capacity, 256);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = OrchestratorConfig::default();
        config.statistics.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_engine_without_address() {
        let mut config = OrchestratorConfig::default();
        config.engines.push(EngineConfig {
            instance_id: "engine-1".to_string(),
            addresses: vec![],
            tick_interval_ms: 50,
            vehicles_per_frame: 8,
            attributes: HashMap::new(),
        });
        assert!(config.validate().is_err());
    }
}
