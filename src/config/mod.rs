//! Configuration module
//!
//! Handles CLI argument parsing, TOML fleet files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::distributed::backend::{BackendSettings, DatabaseKind};
use crate::distributed::protocol::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub database: DatabaseConfig,
    pub fleet: MembersConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Database under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    /// Label for this run (e.g. "etcd-v3.2-go1.8"); defaults to the kind
    #[serde(default)]
    pub tag: Option<String>,
}

impl DatabaseConfig {
    pub fn tag(&self) -> String {
        self.tag
            .clone()
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }
}

/// Fleet membership
///
/// `agents[i]` is the control endpoint of the agent that runs database peer
/// `peers[i]`. Order is significant: position encodes role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersConfig {
    pub agents: Vec<String>,
    pub peers: Vec<String>,
    /// Clients across the whole fleet, split between agents
    #[serde(default = "default_client_count")]
    pub client_count: i64,
    /// How long the fleet runs between Start and Stop
    #[serde(default = "default_run_duration_secs")]
    pub run_duration_secs: u64,
}

fn default_client_count() -> i64 {
    1
}

fn default_run_duration_secs() -> u64 {
    60
}

impl MembersConfig {
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_duration_secs)
    }
}

/// Control-plane timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Bound on every control call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between heartbeat rounds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Attempts per peer per heartbeat round before it is reported unhealthy
    #[serde(default = "default_heartbeat_attempts")]
    pub heartbeat_attempts: u32,
    /// Initial retry backoff, doubled after every failed attempt
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Ask agents to upload their logs on Stop
    #[serde(default)]
    pub upload_logs: bool,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_heartbeat_interval_ms() -> u64 {
    5000
}

fn default_heartbeat_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_attempts: default_heartbeat_attempts(),
            backoff_ms: default_backoff_ms(),
            upload_logs: false,
        }
    }
}

/// Report output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Per-second time series (CSV)
    #[serde(default = "default_time_series_path")]
    pub time_series_path: PathBuf,
    /// Optional machine-readable summary
    #[serde(default)]
    pub summary_json: Option<PathBuf>,
}

fn default_time_series_path() -> PathBuf {
    PathBuf::from("timeseries.csv")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            time_series_path: default_time_series_path(),
            summary_json: None,
        }
    }
}
