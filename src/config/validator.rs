//! Configuration validation

use super::*;
use crate::distributed::protocol::{encode_peer_list, PEER_DELIMITER};
use anyhow::{Context, Result};

/// Validate complete configuration
pub fn validate_config(config: &FleetConfig) -> Result<()> {
    validate_members(&config.fleet)?;
    validate_client(&config.client)?;
    validate_rpc(&config.rpc)?;

    Ok(())
}

/// Validate fleet membership
pub fn validate_members(fleet: &MembersConfig) -> Result<()> {
    if fleet.agents.is_empty() {
        anyhow::bail!("fleet.agents must list at least one agent");
    }

    if fleet.agents.len() != fleet.peers.len() {
        anyhow::bail!(
            "fleet.agents ({}) and fleet.peers ({}) must have the same length",
            fleet.agents.len(),
            fleet.peers.len()
        );
    }

    for (i, agent) in fleet.agents.iter().enumerate() {
        if agent.trim().is_empty() {
            anyhow::bail!("fleet.agents[{}] is empty", i);
        }
    }

    encode_peer_list(&fleet.peers)
        .with_context(|| format!("fleet.peers must be non-empty and free of {:?}", PEER_DELIMITER))?;

    if fleet.client_count < 1 {
        anyhow::bail!("fleet.client_count must be at least 1, got {}", fleet.client_count);
    }

    if fleet.run_duration_secs == 0 {
        anyhow::bail!("fleet.run_duration_secs must be greater than 0");
    }

    Ok(())
}

/// Validate benchmark client sizing
pub fn validate_client(client: &ClientConfig) -> Result<()> {
    if client.connections < 1 {
        anyhow::bail!("client.connections must be at least 1, got {}", client.connections);
    }
    if client.clients < 1 {
        anyhow::bail!("client.clients must be at least 1, got {}", client.clients);
    }
    if client.key_size_bytes < 0 || client.value_size_bytes < 0 {
        anyhow::bail!("client key and value sizes must not be negative");
    }
    if client.total_requests < 0 {
        anyhow::bail!("client.total_requests must not be negative");
    }
    if let Some(rate) = client.rate_limit {
        if rate < 1 {
            anyhow::bail!("client.rate_limit must be at least 1 when set, got {}", rate);
        }
    }

    Ok(())
}

/// Validate control-plane timing
pub fn validate_rpc(rpc: &RpcConfig) -> Result<()> {
    if rpc.timeout_ms == 0 {
        anyhow::bail!("rpc.timeout_ms must be greater than 0");
    }
    if rpc.heartbeat_attempts == 0 {
        anyhow::bail!("rpc.heartbeat_attempts must be at least 1");
    }
    if rpc.heartbeat_interval_ms == 0 {
        anyhow::bail!("rpc.heartbeat_interval_ms must be greater than 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FleetConfig {
        FleetConfig {
            database: DatabaseConfig {
                kind: DatabaseKind::ConsulV0_8_0,
                tag: None,
            },
            fleet: MembersConfig {
                agents: vec!["a:3500".to_string(), "b:3500".to_string()],
                peers: vec!["a:8300".to_string(), "b:8300".to_string()],
                client_count: 10,
                run_duration_secs: 30,
            },
            client: ClientConfig::default(),
            rpc: RpcConfig::default(),
            backend: BackendSettings::default(),
            report: ReportConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_members() {
        let mut c = config();
        c.fleet.agents.clear();
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.fleet.peers.pop();
        let err = validate_config(&c).unwrap_err();
        assert!(err.to_string().contains("same length"));

        let mut c = config();
        c.fleet.peers[1] = "b___c:8300".to_string();
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.fleet.peers[0] = String::new();
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.fleet.agents[1] = " ".to_string();
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.fleet.client_count = 0;
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.fleet.run_duration_secs = 0;
        assert!(validate_config(&c).is_err());
    }

    #[test]
    fn test_validate_client() {
        let mut c = config();
        c.client.rate_limit = Some(0);
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.client.connections = 0;
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.client.rate_limit = Some(5000);
        assert!(validate_config(&c).is_ok());
    }

    #[test]
    fn test_validate_rpc() {
        let mut c = config();
        c.rpc.timeout_ms = 0;
        assert!(validate_config(&c).is_err());

        let mut c = config();
        c.rpc.heartbeat_attempts = 0;
        assert!(validate_config(&c).is_err());
    }
}
