//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Traffic Orchestrator - dispatch, relay and record traffic-simulation jobs
#[derive(Parser, Debug)]
#[command(
    name = "traffic-orchestrator",
    author,
    version,
    about = "Traffic-simulation orchestration service",
    long_about = "Orchestrates long-running traffic-simulation jobs executed by \n\
                  engine processes: dispatches tasks to registered engines, relays \n\
                  per-tick output to live viewers, computes rolling statistics, and \n\
                  records step data asynchronously."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TRAFFIC_ORCHESTRATOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TRAFFIC_ORCHESTRATOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation task end to end against mock engines
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "TRAFFIC_ORCHESTRATOR_CONFIG"
    )]
    pub config: PathBuf,

    /// Task identifier
    #[arg(long, default_value = "demo-task", env = "TRAFFIC_ORCHESTRATOR_TASK_ID")]
    pub task_id: String,

    /// Owner identity attached to the task
    #[arg(long, default_value = "local-user", env = "TRAFFIC_ORCHESTRATOR_OWNER")]
    pub owner: String,

    /// Map identifier resolved into the task config
    #[arg(long, default_value = "grid-small")]
    pub map: String,

    /// Number of simulation steps to run (0 = run until stopped)
    #[arg(long, default_value = "200", env = "TRAFFIC_ORCHESTRATOR_STEPS")]
    pub steps: u64,

    /// Apply a green-ratio control (0-100) once the task is running
    #[arg(long)]
    pub green_ratio: Option<u8>,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "TRAFFIC_ORCHESTRATOR_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "TRAFFIC_ORCHESTRATOR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed engine information
    #[arg(long)]
    pub engines: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
