//! `run` command implementation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{EngineConfig, OrchestratorConfig, TaskConfig, TaskId, TickMessage};
use engine_client::{MockEngineClient, MockEngineSettings};
use observability::TickMetricsAggregator;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::orchestrator::{Orchestrator, RunStats};

/// Execute the `run` command
pub async fn run_simulation(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        engines = config.engines.len(),
        window_size = config.statistics.window_size,
        persistence_mode = ?config.persistence.mode,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    // Metrics endpoint (optional)
    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    // Build the orchestrator and register mock engines
    let orchestrator: Orchestrator<MockEngineClient> =
        Orchestrator::new(config.clone()).context("Failed to build orchestrator")?;

    let engine_configs = if config.engines.is_empty() {
        warn!("No engines configured, registering one default mock engine");
        vec![EngineConfig {
            instance_id: "mock-engine-1".to_string(),
            addresses: vec!["inproc://mock-engine-1".to_string()],
            tick_interval_ms: 20,
            vehicles_per_frame: 8,
            attributes: HashMap::new(),
        }]
    } else {
        config.engines.clone()
    };

    for engine in &engine_configs {
        let client = MockEngineClient::with_settings(MockEngineSettings {
            instance_id: engine.instance_id.as_str().into(),
            tick_interval: Duration::from_millis(engine.tick_interval_ms),
            vehicles_per_frame: engine.vehicles_per_frame,
            default_total_steps: args.steps,
            ..Default::default()
        });
        client.set_events(orchestrator.events());
        orchestrator
            .register_engine(
                engine.instance_id.as_str().into(),
                engine.addresses.clone(),
                client,
            )
            .await;
    }

    let evicted = orchestrator.evict_stale_engines().await;
    if !evicted.is_empty() {
        warn!(count = evicted.len(), "evicted stale engine registrations");
    }

    // Prepare first (viewer channel opens here), then attach, then start
    let task_id: TaskId = args.task_id.as_str().into();
    let task_config = TaskConfig {
        map_id: args.map.clone(),
        total_steps: (args.steps > 0).then_some(args.steps),
        params: HashMap::new(),
    };

    orchestrator
        .prepare(task_id.clone(), args.owner.as_str().into(), task_config)
        .await
        .context("Failed to prepare task")?;

    let mut viewer_rx = orchestrator
        .take_viewer(&task_id)
        .context("Failed to attach viewer")?;

    let ack = orchestrator
        .start(&task_id)
        .await
        .context("Failed to start task")?;
    info!(task_id = %task_id, instance_id = %ack.instance_id, "task running");

    if let Some(percent) = args.green_ratio {
        orchestrator
            .control_green_ratio(&task_id, percent)
            .await
            .context("Green-ratio control rejected")?;
        info!(percent, "green-ratio control applied");
    }

    // Consume the viewer stream until it ends, we time out, or Ctrl-C
    let start_time = Instant::now();
    let mut aggregator = TickMetricsAggregator::new();

    let timeout = async {
        if args.timeout == 0 {
            std::future::pending::<()>().await
        } else {
            tokio::time::sleep(Duration::from_secs(args.timeout)).await
        }
    };

    tokio::select! {
        _ = consume_stream(&mut viewer_rx, &mut aggregator) => {
            info!("Viewer stream ended");
        }
        _ = timeout => {
            warn!(timeout_secs = args.timeout, "Run timed out, stopping task");
            let _ = orchestrator.stop(&task_id).await;
            drain_stream(&mut viewer_rx, &mut aggregator).await;
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping task");
            let _ = orchestrator.stop(&task_id).await;
            drain_stream(&mut viewer_rx, &mut aggregator).await;
        }
    }

    // Collect final state, then flush persistence. The session's
    // completion report is processed asynchronously, so give the status
    // a moment to reach its terminal value.
    let mut final_status = None;
    for _ in 0..100 {
        final_status = orchestrator.task_status(&task_id).await.ok().flatten();
        if final_status.is_some_and(|s| s.is_terminal()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let engines = orchestrator.engine_count().await;
    info!(
        active_sessions = orchestrator.active_sessions(),
        "flushing persistence"
    );
    let persist = orchestrator.shutdown().await;

    let stats = RunStats {
        ticks: aggregator,
        duration: start_time.elapsed(),
        persist,
        engines,
        final_status,
    };

    info!(
        ticks = stats.ticks.total_ticks,
        duration_secs = stats.duration.as_secs_f64(),
        tps = format!("{:.2}", stats.tps()),
        "Run completed"
    );
    stats.print_summary();

    info!("Traffic Orchestrator finished");
    Ok(())
}

/// Consume viewer messages until the stream ends
async fn consume_stream(
    viewer_rx: &mut mpsc::Receiver<TickMessage>,
    aggregator: &mut TickMetricsAggregator,
) {
    while let Some(msg) = viewer_rx.recv().await {
        observability::record_tick_metrics(&msg.stats);
        aggregator.update(&msg.stats);

        if msg.frame.step % 50 == 0 {
            info!(
                step = msg.frame.step,
                vehicles = msg.stats.car_number,
                car_in = msg.stats.car_in,
                car_out = msg.stats.car_out,
                jam = format!("{:.3}", msg.stats.jam_index),
                "tick relayed"
            );
        }
    }
}

/// Drain whatever the relay still buffered after a stop
async fn drain_stream(
    viewer_rx: &mut mpsc::Receiver<TickMessage>,
    aggregator: &mut TickMetricsAggregator,
) {
    while let Some(msg) = viewer_rx.recv().await {
        aggregator.update(&msg.stats);
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &OrchestratorConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Session:");
    println!("  Idle timeout: {}s", config.session.idle_timeout_secs);
    println!(
        "  Channels: viewer {}, engine {}",
        config.session.viewer_channel_capacity, config.session.engine_channel_capacity
    );
    println!("\nStatistics:");
    println!("  Window size: {} ticks", config.statistics.window_size);
    println!(
        "  Free-flow speed: {} m/s",
        config.statistics.free_flow_speed_mps
    );
    println!("\nPersistence:");
    println!("  Mode: {:?}", config.persistence.mode);
    println!("  Base path: {}", config.persistence.base_path.display());
    println!("  Queue capacity: {}", config.persistence.queue_capacity);

    println!("\nEngines ({}):", config.engines.len());
    for engine in &config.engines {
        println!(
            "  - {} ({} addresses, {}ms ticks)",
            engine.instance_id,
            engine.addresses.len(),
            engine.tick_interval_ms
        );
    }

    println!();
}
