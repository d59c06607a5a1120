//! Fleet coordinator
//!
//! This module implements the coordinator side of the control protocol.
//! The coordinator:
//! - Sends START to every agent concurrently and waits for every verdict
//! - Aborts the whole run if any agent fails to start
//! - Checks agents with HEARTBEAT, retrying with backoff
//! - Sends STOP to every agent and collects disk usage (best effort)
//!
//! Agents only bring up their database peers on START. The benchmark
//! clients run from [`LaunchedFleet::spawn_clients`], and a `LaunchedFleet`
//! exists only once every agent has started.

use crate::config::FleetConfig;
use crate::distributed::backend::{select_backend, BackendConfig};
use crate::distributed::protocol::{encode_peer_list, ControlRequest, ControlResponse, Operation};
use crate::distributed::transport::Transport;
use crate::worker::{run_clients, ClientPool, OutcomeSender, RequestDriver};
use anyhow::{Context, Result};
use rand::Rng;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One agent that did not answer a phase successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFailure {
    pub index: usize,
    pub endpoint: String,
    pub reason: String,
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {} ({}): {}", self.index, self.endpoint, self.reason)
    }
}

fn join_failures(failures: &[PeerFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coordinator verdicts that end a run
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("fleet start failed on {} of {total} agents: {}", .failures.len(), join_failures(.failures))]
    StartFailed {
        failures: Vec<PeerFailure>,
        total: usize,
    },
}

/// Outcome of one heartbeat round
#[derive(Debug, Clone, Default)]
pub struct HeartbeatReport {
    pub healthy: Vec<usize>,
    pub unhealthy: Vec<PeerFailure>,
}

impl HeartbeatReport {
    pub fn all_healthy(&self) -> bool {
        self.unhealthy.is_empty()
    }
}

/// Disk usage reported by one agent after STOP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    pub index: usize,
    pub endpoint: String,
    pub bytes: i64,
}

/// Outcome of the STOP phase
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    pub disk_usage: Vec<DiskUsage>,
    pub failures: Vec<PeerFailure>,
}

impl StopReport {
    /// Sum over agents that reported
    pub fn total_disk_usage(&self) -> i64 {
        self.disk_usage.iter().map(|d| d.bytes).sum()
    }
}

/// Split the fleet-wide client count between agents
///
/// The first `total % agents` agents take one extra client.
pub fn assign_clients(total: i64, agents: usize) -> Vec<i64> {
    if agents == 0 {
        return Vec::new();
    }
    let n = agents as i64;
    let base = total / n;
    let extra = total % n;
    (0..n).map(|i| base + i64::from(i < extra)).collect()
}

/// Fleet coordinator
///
/// Holds the request template shared by every phase.
pub struct FleetCoordinator<T: Transport> {
    config: Arc<FleetConfig>,
    transport: Arc<T>,
    peer_list: String,
    backend: BackendConfig,
    client_counts: Vec<i64>,
}

impl<T: Transport> FleetCoordinator<T> {
    /// Create a coordinator for `config`
    pub fn new(config: Arc<FleetConfig>, transport: T) -> Result<Self> {
        if config.fleet.agents.is_empty() {
            anyhow::bail!("No agents specified for the fleet");
        }
        if config.fleet.agents.len() != config.fleet.peers.len() {
            anyhow::bail!(
                "Fleet has {} agents but {} database peers",
                config.fleet.agents.len(),
                config.fleet.peers.len()
            );
        }

        let peer_list = encode_peer_list(&config.fleet.peers).context("Invalid peer list")?;
        let backend = select_backend(config.database.kind, &config.backend);
        let client_counts = assign_clients(config.fleet.client_count, config.fleet.agents.len());

        Ok(Self {
            config,
            transport: Arc::new(transport),
            peer_list,
            backend,
            client_counts,
        })
    }

    pub fn agents(&self) -> &[String] {
        &self.config.fleet.agents
    }

    /// Build the request for agent `index`
    pub fn request(&self, operation: Operation, index: usize, trigger_log_upload: bool) -> ControlRequest {
        ControlRequest {
            operation,
            trigger_log_upload,
            database_kind: self.config.database.kind,
            database_tag: self.config.database.tag(),
            peer_list: self.peer_list.clone(),
            self_index: index as u32,
            client_count: self.client_counts[index],
            client_config: self.config.client.clone(),
            backend: self.backend.clone(),
        }
    }

    /// Run the START barrier
    ///
    /// Returns only after every agent has answered or timed out. On any
    /// failure the agents that did start are stopped again and the run fails.
    pub async fn start(self) -> std::result::Result<LaunchedFleet<T>, FleetError> {
        let total = self.agents().len();
        info!(
            agents = total,
            database = %self.config.database.kind,
            tag = %self.config.database.tag(),
            "Sending START to all agents"
        );

        let results = self.fan_out(Operation::Start, false, 0..total, 1).await;

        let mut started = Vec::new();
        let mut failures = Vec::new();
        for (index, result) in results {
            match result {
                Ok(_) => {
                    debug!(agent = index, "START acknowledged");
                    started.push(index);
                }
                Err(e) => failures.push(self.failure(index, &e)),
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                warn!(agent = failure.index, endpoint = %failure.endpoint, reason = %failure.reason, "START failed");
            }
            if !started.is_empty() {
                warn!(agents = started.len(), "Stopping agents that started before the barrier failed");
                let rollback = self.fan_out(Operation::Stop, false, started, 1).await;
                for (index, result) in rollback {
                    if let Err(e) = result {
                        warn!(agent = index, error = %format!("{:#}", e), "Rollback STOP failed");
                    }
                }
            }
            return Err(FleetError::StartFailed { failures, total });
        }

        info!(agents = total, "All agents started");
        Ok(LaunchedFleet { coordinator: self })
    }

    /// Send `operation` to the given agents concurrently
    ///
    /// Results are returned in agent order.
    async fn fan_out(
        &self,
        operation: Operation,
        trigger_log_upload: bool,
        indices: impl IntoIterator<Item = usize>,
        attempts: u32,
    ) -> Vec<(usize, Result<ControlResponse>)> {
        let timeout = self.config.rpc.timeout();
        let backoff = self.config.rpc.backoff();

        let mut tasks = JoinSet::new();
        let mut expected = Vec::new();
        for index in indices {
            let transport = Arc::clone(&self.transport);
            let endpoint = self.config.fleet.agents[index].clone();
            let request = self.request(operation, index, trigger_log_upload);
            expected.push(index);
            tasks.spawn(async move {
                let result = call_with_retry(transport, &endpoint, request, timeout, attempts, backoff).await;
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(expected.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => warn!(error = %e, "{} task aborted", operation),
            }
        }

        // A panicked task leaves no entry; report it as a failure for its agent
        for index in expected {
            if !results.iter().any(|(i, _)| *i == index) {
                results.push((index, Err(anyhow::anyhow!("{} task panicked", operation))));
            }
        }

        results.sort_by_key(|(index, _)| *index);
        results
    }

    fn failure(&self, index: usize, error: &anyhow::Error) -> PeerFailure {
        PeerFailure {
            index,
            endpoint: self.config.fleet.agents[index].clone(),
            reason: format!("{:#}", error),
        }
    }
}

/// Handle to a fleet whose START barrier succeeded
pub struct LaunchedFleet<T: Transport> {
    coordinator: FleetCoordinator<T>,
}

impl<T: Transport> LaunchedFleet<T> {
    pub fn agents(&self) -> &[String] {
        self.coordinator.agents()
    }

    /// Start the benchmark clients against the launched databases
    ///
    /// The pool runs on its own thread; the handle completes once every
    /// client has exited. `sender` moves into the pool so the result stream
    /// closes with the last client.
    pub fn spawn_clients<D: RequestDriver>(
        &self,
        pool: ClientPool,
        driver: Arc<D>,
        stop: Arc<AtomicBool>,
        sender: OutcomeSender,
    ) -> Result<JoinHandle<Result<()>>> {
        info!(
            agents = self.agents().len(),
            clients = pool.clients,
            requests_per_client = ?pool.requests_per_client,
            "Fleet launched, starting load"
        );

        std::thread::Builder::new()
            .name("client-pool".to_string())
            .spawn(move || run_clients(pool, driver, stop, sender))
            .context("Failed to spawn client pool thread")
    }

    /// One heartbeat round across the fleet
    ///
    /// Each agent gets up to `heartbeat_attempts` tries with exponential
    /// backoff. Agents that never answer are reported, not treated as fatal.
    pub async fn heartbeat(&self) -> HeartbeatReport {
        let total = self.agents().len();
        let attempts = self.coordinator.config.rpc.heartbeat_attempts.max(1);
        let results = self
            .coordinator
            .fan_out(Operation::Heartbeat, false, 0..total, attempts)
            .await;

        let mut report = HeartbeatReport::default();
        for (index, result) in results {
            match result {
                Ok(_) => report.healthy.push(index),
                Err(e) => report.unhealthy.push(self.coordinator.failure(index, &e)),
            }
        }

        if !report.all_healthy() {
            warn!(
                unhealthy = report.unhealthy.len(),
                agents = total,
                "Fleet health degraded: {}",
                join_failures(&report.unhealthy)
            );
        }
        report
    }

    /// Heartbeat the fleet until `run_for` has elapsed
    ///
    /// Returns the number of rounds that found an unhealthy agent.
    pub async fn monitor(&self, run_for: Duration) -> usize {
        let interval = self.coordinator.config.rpc.heartbeat_interval();
        let deadline = tokio::time::Instant::now() + run_for;
        let mut degraded_rounds = 0;

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
            if tokio::time::Instant::now() >= deadline {
                break;
            }

            let report = self.heartbeat().await;
            if !report.all_healthy() {
                degraded_rounds += 1;
            }
        }

        degraded_rounds
    }

    /// Send STOP to every agent and collect disk usage
    ///
    /// Failures are logged and recorded; whatever disk usage arrived is kept.
    pub async fn stop(self, trigger_log_upload: bool) -> StopReport {
        let total = self.agents().len();
        info!(agents = total, upload_logs = trigger_log_upload, "Sending STOP to all agents");

        let results = self
            .coordinator
            .fan_out(Operation::Stop, trigger_log_upload, 0..total, 1)
            .await;

        let mut report = StopReport::default();
        for (index, result) in results {
            match result {
                Ok(response) => report.disk_usage.push(DiskUsage {
                    index,
                    endpoint: self.coordinator.config.fleet.agents[index].clone(),
                    bytes: response.disk_usage_bytes,
                }),
                Err(e) => {
                    let failure = self.coordinator.failure(index, &e);
                    warn!(agent = index, endpoint = %failure.endpoint, reason = %failure.reason, "STOP failed");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            stopped = report.disk_usage.len(),
            failed = report.failures.len(),
            "STOP phase finished"
        );
        report
    }
}

/// One timeout-bounded call; a reply with `success == false` is an error
async fn call<T: Transport>(
    transport: &T,
    endpoint: &str,
    request: ControlRequest,
    timeout: Duration,
) -> Result<ControlResponse> {
    let operation = request.operation;
    let response = tokio::time::timeout(timeout, transport.transfer(endpoint, request))
        .await
        .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", operation, timeout))??;

    if !response.success {
        anyhow::bail!("agent rejected {}", operation);
    }
    Ok(response)
}

/// Retry `call` with exponential backoff and jitter
async fn call_with_retry<T: Transport>(
    transport: Arc<T>,
    endpoint: &str,
    request: ControlRequest,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
) -> Result<ControlResponse> {
    let attempts = attempts.max(1);
    let mut delay = backoff;
    let mut attempt = 1;

    loop {
        match call(transport.as_ref(), endpoint, request.clone(), timeout).await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < attempts => {
                debug!(
                    endpoint,
                    attempt,
                    error = %format!("{:#}", e),
                    "{} attempt failed, retrying",
                    request.operation
                );
                let jitter = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
                tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                return Err(e.context(format!("{} failed after {} attempt(s)", request.operation, attempt)))
            }
        }
    }
}
