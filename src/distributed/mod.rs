//! Fleet control plane
//!
//! # Architecture
//!
//! One coordinator drives a fleet of agents. Each agent runs one peer of the
//! database cluster under test. The coordinator starts the benchmark clients
//! only after every agent has started its peer.
//!
//! - **Coordinator**: fans Start/Heartbeat/Stop out to every agent concurrently
//! - **Node Service**: runs on each agent, answers control requests
//! - **Transport**: one framed request/response exchange per call
//!
//! # Modules
//!
//! - `protocol`: control messages, peer-list encoding, framing
//! - `backend`: database kinds and their per-engine flags
//! - `transport`: the `Transfer` seam and its TCP implementation
//! - `node_service`: agent-side service
//! - `coordinator`: fleet lifecycle

pub mod backend;
pub mod coordinator;
pub mod node_service;
pub mod protocol;
pub mod transport;

pub use backend::{BackendConfig, DatabaseKind};
pub use coordinator::{FleetCoordinator, FleetError, LaunchedFleet};
pub use node_service::{ControlHandler, NodeService};
pub use protocol::{ControlRequest, ControlResponse, Operation, PEER_DELIMITER};
pub use transport::{TcpTransport, Transport};
