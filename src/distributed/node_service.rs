//! Agent-side control service
//!
//! This module implements the service that runs on every fleet machine.
//! The service:
//! - Listens for connections from the coordinator
//! - Reads one framed `ControlRequest` per connection
//! - Validates the peer list, self index, and backend block
//! - Dispatches to a [`ControlHandler`] on the blocking pool
//! - Replies with a `ControlResponse`
//!
//! Starting and stopping the database and measuring its disk usage belong to
//! the handler.

use crate::distributed::protocol::{read_message, write_message, ControlRequest, ControlResponse, Operation};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Side effects of the control operations on one agent
pub trait ControlHandler: Send + Sync + 'static {
    /// Bring up the database peer at `request.self_peer()`
    ///
    /// Only the database starts here. Load is generated by the coordinator
    /// once every agent has acknowledged START.
    fn start(&self, request: &ControlRequest) -> Result<()>;

    /// Shut everything down; returns the database's on-disk size in bytes,
    /// measured after the process has exited
    fn stop(&self, request: &ControlRequest) -> Result<i64>;

    /// Liveness check
    fn heartbeat(&self, _request: &ControlRequest) -> Result<()> {
        Ok(())
    }
}

/// Agent service bound to a listening socket
pub struct NodeService<H: ControlHandler> {
    listener: TcpListener,
    handler: Arc<H>,
    node_id: String,
}

impl<H: ControlHandler> NodeService<H> {
    /// Bind the service to `addr` (e.g. "0.0.0.0:3500")
    pub async fn bind(addr: &str, handler: H) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind agent service on {}", addr))?;

        Ok(Self {
            listener,
            handler: Arc::new(handler),
            node_id: get_node_id(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read listener address")
    }

    /// Accept coordinator connections until the listener fails
    pub async fn run(self) -> Result<()> {
        info!(node = %self.node_id, addr = %self.local_addr()?, "Agent service listening");

        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("Failed to accept connection")?;
            debug!(%peer, "Coordinator connected");

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, handler).await {
                    warn!(%peer, error = %format!("{:#}", e), "Control connection failed");
                }
            });
        }
    }
}

/// Serve a single request/response exchange
async fn handle_connection<H: ControlHandler>(mut stream: TcpStream, handler: Arc<H>) -> Result<()> {
    let request: ControlRequest = read_message(&mut stream).await?;
    let operation = request.operation;

    let response = tokio::task::spawn_blocking(move || dispatch(handler.as_ref(), &request))
        .await
        .with_context(|| format!("{} handler panicked", operation))?;

    write_message(&mut stream, &response).await
}

/// Validate a request and run the matching handler
pub fn dispatch<H: ControlHandler + ?Sized>(handler: &H, request: &ControlRequest) -> ControlResponse {
    if let Err(e) = request.validate() {
        warn!(operation = %request.operation, error = %e, "Rejecting invalid control request");
        return ControlResponse::failed();
    }

    let result = match request.operation {
        Operation::Start => {
            info!(
                database = %request.database_kind,
                tag = %request.database_tag,
                index = request.self_index,
                clients = request.client_count,
                "START received"
            );
            handler.start(request).map(|_| ControlResponse::ok())
        }
        Operation::Stop => {
            info!(upload_logs = request.trigger_log_upload, "STOP received");
            handler.stop(request).map(|bytes| ControlResponse {
                success: true,
                disk_usage_bytes: bytes,
            })
        }
        Operation::Heartbeat => handler.heartbeat(request).map(|_| ControlResponse::ok()),
    };

    result.unwrap_or_else(|e| {
        warn!(operation = %request.operation, error = %format!("{:#}", e), "Control handler failed");
        ControlResponse::failed()
    })
}

fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, FleetConfig, MembersConfig, ReportConfig, RpcConfig};
    use crate::distributed::backend::{select_backend, BackendSettings, DatabaseKind};
    use crate::distributed::coordinator::{FleetCoordinator, FleetError};
    use crate::distributed::protocol::{encode_peer_list, ClientConfig};
    use crate::distributed::transport::TcpTransport;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        disk_usage: i64,
        fail_start: bool,
        seen: Mutex<Vec<(Operation, String)>>,
    }

    impl ControlHandler for RecordingHandler {
        fn start(&self, request: &ControlRequest) -> Result<()> {
            self.seen.lock().unwrap().push((Operation::Start, request.self_peer()?));
            if self.fail_start {
                anyhow::bail!("database failed to launch");
            }
            Ok(())
        }

        fn stop(&self, request: &ControlRequest) -> Result<i64> {
            self.seen.lock().unwrap().push((Operation::Stop, request.self_peer()?));
            Ok(self.disk_usage)
        }
    }

    fn request(operation: Operation, self_index: u32) -> ControlRequest {
        ControlRequest {
            operation,
            trigger_log_upload: false,
            database_kind: DatabaseKind::ZookeeperR3_4_9,
            database_tag: "zookeeper-r3.4.9-java8".to_string(),
            peer_list: encode_peer_list(&["10.0.0.1:2181", "10.0.0.2:2181"]).unwrap(),
            self_index,
            client_count: 10,
            client_config: ClientConfig::default(),
            backend: select_backend(DatabaseKind::ZookeeperR3_4_9, &BackendSettings::default()),
        }
    }

    #[test]
    fn test_dispatch_start_uses_self_peer() {
        let handler = RecordingHandler::default();
        let response = dispatch(&handler, &request(Operation::Start, 1));

        assert!(response.success);
        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec![(Operation::Start, "10.0.0.2:2181".to_string())]
        );
    }

    #[test]
    fn test_dispatch_stop_reports_disk_usage() {
        let handler = RecordingHandler {
            disk_usage: 42 * 1024 * 1024,
            ..RecordingHandler::default()
        };
        let response = dispatch(&handler, &request(Operation::Stop, 0));

        assert!(response.success);
        assert_eq!(response.disk_usage_bytes, 42 * 1024 * 1024);
    }

    #[test]
    fn test_dispatch_rejects_invalid_requests() {
        let handler = RecordingHandler::default();

        let response = dispatch(&handler, &request(Operation::Start, 2));
        assert!(!response.success);

        let mut mismatched = request(Operation::Start, 0);
        mismatched.backend = select_backend(DatabaseKind::EtcdV3_1, &BackendSettings::default());
        assert!(!dispatch(&handler, &mismatched).success);

        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_handler_error_is_failure() {
        let handler = RecordingHandler {
            fail_start: true,
            ..RecordingHandler::default()
        };
        assert!(!dispatch(&handler, &request(Operation::Start, 0)).success);
    }

    async fn spawn_agent(handler: RecordingHandler) -> String {
        let service = NodeService::bind("127.0.0.1:0", handler).await.unwrap();
        let addr = service.local_addr().unwrap().to_string();
        tokio::spawn(service.run());
        addr
    }

    fn fleet_config(agents: Vec<String>) -> Arc<FleetConfig> {
        let peers = (0..agents.len()).map(|i| format!("10.0.0.{}:2379", i + 1)).collect();
        Arc::new(FleetConfig {
            database: DatabaseConfig {
                kind: DatabaseKind::EtcdV3_2,
                tag: None,
            },
            fleet: MembersConfig {
                agents,
                peers,
                client_count: 30,
                run_duration_secs: 1,
            },
            client: ClientConfig::default(),
            rpc: RpcConfig {
                timeout_ms: 2000,
                heartbeat_interval_ms: 10,
                heartbeat_attempts: 2,
                backoff_ms: 5,
                upload_logs: false,
            },
            backend: BackendSettings::default(),
            report: ReportConfig::default(),
        })
    }

    #[tokio::test]
    async fn test_tcp_fleet_lifecycle() {
        let mut agents = Vec::new();
        for i in 0..3 {
            agents.push(
                spawn_agent(RecordingHandler {
                    disk_usage: 1000 * (i + 1),
                    ..RecordingHandler::default()
                })
                .await,
            );
        }

        let coordinator = FleetCoordinator::new(
            fleet_config(agents),
            TcpTransport::new(Duration::from_secs(1)),
        )
        .unwrap();

        let fleet = coordinator.start().await.unwrap();
        assert!(fleet.heartbeat().await.all_healthy());

        let report = fleet.stop(false).await;
        assert!(report.failures.is_empty());
        let usage: Vec<i64> = report.disk_usage.iter().map(|d| d.bytes).collect();
        assert_eq!(usage, vec![1000, 2000, 3000]);
    }

    #[tokio::test]
    async fn test_tcp_fleet_start_failure() {
        let agents = vec![
            spawn_agent(RecordingHandler::default()).await,
            spawn_agent(RecordingHandler {
                fail_start: true,
                ..RecordingHandler::default()
            })
            .await,
            spawn_agent(RecordingHandler::default()).await,
        ];

        let coordinator = FleetCoordinator::new(
            fleet_config(agents),
            TcpTransport::new(Duration::from_secs(1)),
        )
        .unwrap();

        match coordinator.start().await {
            Ok(_) => panic!("start must fail"),
            Err(FleetError::StartFailed { failures, total }) => {
                assert_eq!(total, 3);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
            }
        }
    }
}
