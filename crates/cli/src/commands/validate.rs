//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    idle_timeout_secs: u64,
    window_size: usize,
    persistence_mode: String,
    engine_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    idle_timeout_secs: config.session.idle_timeout_secs,
                    window_size: config.statistics.window_size,
                    persistence_mode: format!("{:?}", config.persistence.mode),
                    engine_count: config.engines.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &contracts::OrchestratorConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.engines.is_empty() {
        warnings.push("No engines configured - task submission will fail".to_string());
    }

    if config.session.idle_timeout_secs < 60 {
        warnings.push(format!(
            "session.idle_timeout_secs is very short ({}s) - sessions may close mid-run",
            config.session.idle_timeout_secs
        ));
    }

    if config.persistence.queue_capacity < 64 {
        warnings.push(format!(
            "persistence.queue_capacity is small ({}) - expect frequent sync-fallback writes",
            config.persistence.queue_capacity
        ));
    }

    for engine in &config.engines {
        if engine.addresses.len() == 1 {
            warnings.push(format!(
                "engine '{}' has a single address - no transport fallback",
                engine.instance_id
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Idle timeout: {}s", summary.idle_timeout_secs);
            println!("  Window size: {}", summary.window_size);
            println!("  Persistence: {}", summary.persistence_mode);
            println!("  Engines: {}", summary.engine_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
