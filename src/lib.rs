//! fleetbench - distributed database benchmark controller
//!
//! fleetbench coordinates a fleet of benchmark agents that each run one peer
//! of a database cluster (etcd, Zookeeper, Consul, or an etcd-compatible
//! proxy). Once every peer is up it drives load against the cluster and turns
//! the resulting stream of request outcomes into a latency report.
//!
//! # Architecture
//!
//! - **Control plane**: Start/Heartbeat/Stop fan-out with a start barrier
//! - **Agent service**: validates and dispatches control requests
//! - **Result stream**: many client threads, one aggregator
//! - **Report**: summary, percentiles, distribution, histogram, time series

pub mod config;
pub mod distributed;
pub mod output;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::FleetConfig;
pub use stats::{Outcome, Report};

/// Result type used throughout fleetbench
pub type Result<T> = anyhow::Result<T>;
