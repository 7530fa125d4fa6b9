//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    session: SessionInfo,
    statistics: StatisticsInfo,
    persistence: PersistenceInfo,
    registry: RegistryInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    engines: Vec<EngineInfo>,
}

#[derive(Serialize)]
struct SessionInfo {
    idle_timeout_secs: u64,
    viewer_channel_capacity: usize,
    engine_channel_capacity: usize,
}

#[derive(Serialize)]
struct StatisticsInfo {
    window_size: usize,
    free_flow_speed_mps: f64,
}

#[derive(Serialize)]
struct PersistenceInfo {
    mode: String,
    base_path: String,
    queue_capacity: usize,
    workers: usize,
}

#[derive(Serialize)]
struct RegistryInfo {
    stale_timeout_secs: u64,
}

#[derive(Serialize)]
struct EngineInfo {
    instance_id: String,
    addresses: Vec<String>,
    tick_interval_ms: u64,
    vehicles_per_frame: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    attributes: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &contracts::OrchestratorConfig, args: &InfoArgs) -> ConfigInfo {
    let engines = if args.engines {
        config
            .engines
            .iter()
            .map(|e| EngineInfo {
                instance_id: e.instance_id.clone(),
                addresses: e.addresses.clone(),
                tick_interval_ms: e.tick_interval_ms,
                vehicles_per_frame: e.vehicles_per_frame,
                attributes: e.attributes.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", config.version),
        session: SessionInfo {
            idle_timeout_secs: config.session.idle_timeout_secs,
            viewer_channel_capacity: config.session.viewer_channel_capacity,
            engine_channel_capacity: config.session.engine_channel_capacity,
        },
        statistics: StatisticsInfo {
            window_size: config.statistics.window_size,
            free_flow_speed_mps: config.statistics.free_flow_speed_mps,
        },
        persistence: PersistenceInfo {
            mode: format!("{:?}", config.persistence.mode),
            base_path: config.persistence.base_path.display().to_string(),
            queue_capacity: config.persistence.queue_capacity,
            workers: config.persistence.workers,
        },
        registry: RegistryInfo {
            stale_timeout_secs: config.registry.stale_timeout_secs,
        },
        engines,
    }
}

fn print_config_info(config: &contracts::OrchestratorConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║             Traffic Orchestrator Configuration               ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Session");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Idle timeout: {}s", config.session.idle_timeout_secs);
    println!(
        "   ├─ Viewer channel: {} frames",
        config.session.viewer_channel_capacity
    );
    println!(
        "   └─ Engine channel: {} frames",
        config.session.engine_channel_capacity
    );

    println!("\n📈 Statistics");
    println!("   ├─ Window size: {} ticks", config.statistics.window_size);
    println!(
        "   └─ Free-flow speed: {} m/s",
        config.statistics.free_flow_speed_mps
    );

    println!("\n💾 Persistence");
    println!("   ├─ Mode: {:?}", config.persistence.mode);
    println!("   ├─ Base path: {}", config.persistence.base_path.display());
    println!("   ├─ Queue capacity: {}", config.persistence.queue_capacity);
    if config.persistence.workers == 0 {
        println!("   └─ Workers: auto (half of available parallelism)");
    } else {
        println!("   └─ Workers: {}", config.persistence.workers);
    }

    println!("\n🔌 Registry");
    println!(
        "   └─ Stale timeout: {}s",
        config.registry.stale_timeout_secs
    );

    println!("\n🚗 Engines ({})", config.engines.len());
    for (i, engine) in config.engines.iter().enumerate() {
        let is_last = i == config.engines.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {}", prefix, engine.instance_id);

        if args.engines {
            println!("   {}  ├─ Addresses: {:?}", child_prefix, engine.addresses);
            println!(
                "   {}  ├─ Tick interval: {}ms",
                child_prefix, engine.tick_interval_ms
            );
            println!(
                "   {}  └─ Vehicles/frame: {}",
                child_prefix, engine.vehicles_per_frame
            );
        } else {
            println!(
                "   {}  └─ {} addresses",
                child_prefix,
                engine.addresses.len()
            );
        }
    }

    println!();
}
