//! fleetbench CLI entry point

use anyhow::{Context, Result};
use fleetbench::config::cli::{AnalyzeArgs, Cli, Command, CoordinateArgs};
use fleetbench::config::{toml, validator, FleetConfig, ReportConfig};
use fleetbench::distributed::coordinator::StopReport;
use fleetbench::distributed::{FleetCoordinator, TcpTransport};
use fleetbench::util::time::{format_bytes, format_duration};
use fleetbench::worker::connect::ConnectDriver;
use fleetbench::worker::{replay::replay_outcomes, result_stream, ClientPool};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Outcomes buffered between the clients and the report thread
const RESULT_QUEUE_DEPTH: usize = 4096;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    println!("fleetbench v{}", env!("CARGO_PKG_VERSION"));
    println!();

    match cli.command {
        Command::Coordinate(args) => run_coordinate(args),
        Command::Analyze(args) => run_analyze(args),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Start the fleet, drive load against it for the run duration, then stop it
///
/// Clients and the report thread only start once the START barrier passed.
fn run_coordinate(args: CoordinateArgs) -> Result<()> {
    let config = toml::parse_toml_file(&args.config)?;
    let config = toml::merge_cli_with_config(&args, config)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    print_configuration(&config);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let run_for = config.fleet.run_duration();
        let upload_logs = config.rpc.upload_logs;
        let report_config = config.report.clone();
        let pool = ClientPool::for_fleet(config.fleet.client_count, config.client.total_requests);
        let driver = Arc::new(ConnectDriver::new(&config.fleet.peers, config.rpc.timeout())?);
        let transport = TcpTransport::new(config.rpc.timeout());

        let coordinator = FleetCoordinator::new(Arc::new(config), transport)
            .context("Failed to create coordinator")?;
        let fleet = coordinator.start().await?;

        let (sender, receiver) = result_stream(Some(RESULT_QUEUE_DEPTH));
        let report_handle = fleetbench::output::spawn_report(receiver, report_config)?;
        let stop = Arc::new(AtomicBool::new(false));
        let clients = fleet.spawn_clients(pool, driver, Arc::clone(&stop), sender)?;

        println!("Fleet started; running for {}", format_duration(run_for));
        println!();

        tokio::select! {
            degraded = fleet.monitor(run_for) => {
                if degraded > 0 {
                    warn!(rounds = degraded, "Heartbeat rounds with unhealthy agents");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping fleet early");
            }
        }

        stop.store(true, Ordering::Relaxed);
        let clients_result = tokio::task::spawn_blocking(move || {
            clients
                .join()
                .map_err(|_| anyhow::anyhow!("Client pool thread panicked"))?
        })
        .await
        .context("Failed to join client pool")?;

        let stop_report = fleet.stop(upload_logs).await;

        let report = tokio::task::spawn_blocking(move || {
            report_handle
                .join()
                .map_err(|_| anyhow::anyhow!("Report thread panicked"))?
        })
        .await
        .context("Failed to join report thread")??;

        print_stop_report(&stop_report);
        clients_result?;

        info!(
            successes = report.success_count(),
            failures = report.error_count(),
            "Run complete"
        );
        Ok(())
    })
}

/// Replay an outcome log through the aggregator and present the report
fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let reader = open_input(&args.input)?;
    let config = ReportConfig {
        time_series_path: args.time_series.clone(),
        summary_json: args.summary_json.clone(),
    };

    let (sender, receiver) = result_stream(Some(args.queue_depth.max(1)));
    let report_handle = fleetbench::output::spawn_report(receiver, config)?;

    let replayed = replay_outcomes(reader, sender);

    let report = report_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Report thread panicked"))??;
    let replayed = replayed?;

    info!(
        records = replayed,
        successes = report.success_count(),
        failures = report.error_count(),
        "Analysis complete"
    );
    Ok(())
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open outcome log {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn print_configuration(config: &FleetConfig) {
    println!("Configuration:");
    println!("  Database: {} ({})", config.database.kind, config.database.tag());
    println!("  Agents:   {}", config.fleet.agents.len());
    for (i, (agent, peer)) in config.fleet.agents.iter().zip(&config.fleet.peers).enumerate() {
        println!("    [{}] {} -> {}", i, agent, peer);
    }
    println!("  Clients:  {}", config.fleet.client_count);
    println!("  Duration: {}", format_duration(config.fleet.run_duration()));
    println!("  Timeout:  {}", format_duration(config.rpc.timeout()));
    println!();
}

fn print_stop_report(report: &StopReport) {
    println!("Disk usage after STOP:");
    for usage in &report.disk_usage {
        println!("  [{}] {:<24} {}", usage.index, usage.endpoint, format_bytes(usage.bytes));
    }
    for failure in &report.failures {
        println!("  [{}] {:<24} no answer ({})", failure.index, failure.endpoint, failure.reason);
    }
    println!("  Total: {}", format_bytes(report.total_disk_usage()));
}
