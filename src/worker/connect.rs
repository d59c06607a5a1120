//! TCP connect driver
//!
//! Each request is one TCP connection setup against a database peer. Client
//! `i` dials peer `i % peers`, so clients spread across the cluster the same
//! way the fleet splits them between agents.

use super::RequestDriver;
use anyhow::{Context, Result};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ConnectDriver {
    peers: Vec<SocketAddr>,
    timeout: Duration,
}

impl ConnectDriver {
    /// Resolve `peers` once; every request then dials a fixed address
    pub fn new(peers: &[String], timeout: Duration) -> Result<Self> {
        if peers.is_empty() {
            anyhow::bail!("Connect driver needs at least one peer");
        }

        let peers = peers.iter().map(|p| resolve(p)).collect::<Result<Vec<_>>>()?;
        Ok(Self { peers, timeout })
    }

    pub fn peers(&self) -> &[SocketAddr] {
        &self.peers
    }
}

fn resolve(peer: &str) -> Result<SocketAddr> {
    peer.to_socket_addrs()
        .with_context(|| format!("Failed to resolve peer {}", peer))?
        .next()
        .with_context(|| format!("Peer {} resolved to no address", peer))
}

impl RequestDriver for ConnectDriver {
    fn execute(&self, client_id: usize) -> Result<()> {
        let peer = self.peers[client_id % self.peers.len()];
        TcpStream::connect_timeout(&peer, self.timeout).with_context(|| format!("connect {}", peer))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_clients_round_robin_over_peers() {
        let first = TcpListener::bind("127.0.0.1:0").unwrap();
        let second = TcpListener::bind("127.0.0.1:0").unwrap();
        let peers = vec![
            first.local_addr().unwrap().to_string(),
            second.local_addr().unwrap().to_string(),
        ];

        let driver = ConnectDriver::new(&peers, Duration::from_secs(1)).unwrap();
        for client_id in 0..4 {
            driver.execute(client_id).unwrap();
        }

        // Connections sit in the backlog until accepted; two landed on each peer
        first.set_nonblocking(true).unwrap();
        second.set_nonblocking(true).unwrap();
        let accepted = |listener: &TcpListener| std::iter::from_fn(|| listener.accept().ok()).count();
        assert_eq!(accepted(&first), 2);
        assert_eq!(accepted(&second), 2);
    }

    #[test]
    fn test_refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let driver = ConnectDriver::new(&[addr.clone()], Duration::from_millis(500)).unwrap();
        let err = driver.execute(0).unwrap_err();
        assert!(format!("{:#}", err).starts_with(&format!("connect {}", addr)));
    }

    #[test]
    fn test_new_rejects_bad_peers() {
        assert!(ConnectDriver::new(&[], Duration::from_secs(1)).is_err());
        assert!(ConnectDriver::new(&["no-port-here".to_string()], Duration::from_secs(1)).is_err());

        let driver = ConnectDriver::new(&["127.0.0.1:2379".to_string()], Duration::from_secs(1)).unwrap();
        assert_eq!(driver.peers(), &["127.0.0.1:2379".parse::<SocketAddr>().unwrap()]);
    }
}
