//! TOML configuration file parsing
//!
//! ```toml
//! [database]
//! kind = "etcd-v3.2"
//! tag = "etcd-v3.2-go1.8"
//!
//! [fleet]
//! agents = ["10.240.0.7:3500", "10.240.0.8:3500", "10.240.0.12:3500"]
//! peers = ["10.240.0.7:2380", "10.240.0.8:2380", "10.240.0.12:2380"]
//! client_count = 300
//! run_duration_secs = 120
//!
//! [rpc]
//! timeout_ms = 3000
//! ```

use super::cli::CoordinateArgs;
use super::*;
use crate::util::time::parse_duration;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<FleetConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<FleetConfig> {
    let config: FleetConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(args: &CoordinateArgs, mut config: FleetConfig) -> Result<FleetConfig> {
    if let Some(duration) = &args.duration {
        config.fleet.run_duration_secs = parse_duration(duration)
            .with_context(|| format!("Invalid --duration: {}", duration))?
            .as_secs();
    }

    if let Some(timeout) = &args.timeout {
        config.rpc.timeout_ms = parse_duration(timeout)
            .with_context(|| format!("Invalid --timeout: {}", timeout))?
            .as_millis() as u64;
    }

    if args.upload_logs {
        config.rpc.upload_logs = true;
    }

    if let Some(clients) = args.clients {
        config.fleet.client_count = clients;
    }

    Ok(config)
}
