//! CLI argument parsing using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fleetbench - distributed database benchmark controller
#[derive(Parser, Debug)]
#[command(name = "fleetbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the fleet, monitor it for the run duration, then stop it
    Coordinate(CoordinateArgs),
    /// Aggregate a recorded outcome stream into a latency report
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CoordinateArgs {
    /// Fleet configuration file (TOML)
    #[arg(short, long, env = "FLEETBENCH_CONFIG")]
    pub config: PathBuf,

    /// Run duration between Start and Stop (e.g., 30s, 5m, 1h)
    #[arg(short = 'd', long)]
    pub duration: Option<String>,

    /// Per-call control timeout (e.g., 500ms, 5s)
    #[arg(long)]
    pub timeout: Option<String>,

    /// Ask agents to upload their logs on Stop
    #[arg(long)]
    pub upload_logs: bool,

    /// Total benchmark clients across the fleet
    #[arg(long)]
    pub clients: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Outcome records, one JSON object per line ("-" for stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Per-second time series output (CSV)
    #[arg(long, default_value = "timeseries.csv")]
    pub time_series: PathBuf,

    /// Write a JSON summary to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Bound on queued outcomes between reader and aggregator
    #[arg(long, default_value = "4096")]
    pub queue_depth: usize,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
