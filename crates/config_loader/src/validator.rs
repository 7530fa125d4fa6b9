//! Configuration validation
//!
//! Rules:
//! - derive-level range/length checks (via `validator`)
//! - engine instance_id unique
//! - engine addresses non-empty and well-formed (no blank entries)
//! - persistence base_path non-empty

use std::collections::HashSet;

use contracts::{ContractError, OrchestratorConfig};
use validator::Validate;

/// Validate an `OrchestratorConfig`
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &OrchestratorConfig) -> Result<(), ContractError> {
    validate_derived(config)?;
    validate_engine_ids(config)?;
    validate_engine_addresses(config)?;
    validate_persistence(config)?;
    Ok(())
}

/// Run the derive-level checks and map the first failure
fn validate_derived(config: &OrchestratorConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// Engine instance ids must be unique
fn validate_engine_ids(config: &OrchestratorConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for engine in &config.engines {
        if !seen.insert(&engine.instance_id) {
            return Err(ContractError::config_validation(
                format!("engines[instance_id={}]", engine.instance_id),
                "duplicate instance_id",
            ));
        }
    }
    Ok(())
}

/// No blank addresses: an instance without a reachable address can never
/// be dispatched to
fn validate_engine_addresses(config: &OrchestratorConfig) -> Result<(), ContractError> {
    for engine in &config.engines {
        for (idx, addr) in engine.addresses.iter().enumerate() {
            if addr.trim().is_empty() {
                return Err(ContractError::config_validation(
                    format!("engines[{}].addresses[{idx}]", engine.instance_id),
                    "address cannot be blank",
                ));
            }
        }
    }
    Ok(())
}

fn validate_persistence(config: &OrchestratorConfig) -> Result<(), ContractError> {
    if config.persistence.base_path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "persistence.base_path",
            "base_path cannot be empty",
        ));
    }
    Ok(())
}
