//! Carrier for the `Transfer` call
//!
//! The coordinator only needs "send this request to that endpoint and give me
//! the reply". [`Transport`] is that seam; [`TcpTransport`] is the default
//! carrier, opening one connection per call and exchanging a single framed
//! request/response pair.

use crate::distributed::protocol::{read_message, write_message, ControlRequest, ControlResponse};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Synchronous request/response delivery to one fleet agent
pub trait Transport: Send + Sync + 'static {
    fn transfer(
        &self,
        endpoint: &str,
        request: ControlRequest,
    ) -> impl Future<Output = Result<ControlResponse>> + Send;
}

/// Framed MessagePack over TCP
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Transport for TcpTransport {
    async fn transfer(&self, endpoint: &str, request: ControlRequest) -> Result<ControlResponse> {
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint))
            .await
            .with_context(|| format!("Timed out connecting to {}", endpoint))?
            .with_context(|| format!("Failed to connect to {}", endpoint))?;

        write_message(&mut stream, &request)
            .await
            .with_context(|| format!("Failed to send {} to {}", request.operation, endpoint))?;

        let response: ControlResponse = read_message(&mut stream)
            .await
            .with_context(|| format!("Failed to read {} reply from {}", request.operation, endpoint))?;

        Ok(response)
    }
}
