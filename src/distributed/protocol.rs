//! Fleet control protocol
//!
//! This module defines the messages exchanged between the coordinator and each
//! fleet agent. There is a single operation, `Transfer(ControlRequest) ->
//! ControlResponse`, invoked once per (peer, phase).
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                      Agent i
//!     |                              |
//!     |-- START(peers, i) ---------->|   (all agents, barrier)
//!     |<------------ OK -------------|
//!     |                              |
//!     |-- HEARTBEAT ---------------->|   (periodic, retried)
//!     |<------------ OK -------------|
//!     |                              |
//!     |-- STOP(upload logs?) ------->|
//!     |<------ OK(disk usage) -------|
//! ```
//!
//! # Peer List
//!
//! The ordered peer list travels as one delimited string. Position encodes
//! role, so the order must survive the round trip exactly.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::distributed::backend::{BackendConfig, DatabaseKind};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Separator between endpoints in an encoded peer list
pub const PEER_DELIMITER: &str = "___";

/// Upper bound on a single framed message
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Control operation
///
/// Encoded on the wire as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Operation {
    Start = 0,
    Stop = 1,
    Heartbeat = 2,
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for Operation {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Start),
            1 => Ok(Operation::Stop),
            2 => Ok(Operation::Heartbeat),
            other => Err(ProtocolError::UnknownOperation(other)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Start => f.write_str("START"),
            Operation::Stop => f.write_str("STOP"),
            Operation::Heartbeat => f.write_str("HEARTBEAT"),
        }
    }
}

/// Protocol-level validation failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown operation code {0}")]
    UnknownOperation(u8),

    #[error("peer endpoint at position {0} is empty")]
    EmptyEndpoint(usize),

    #[error("peer endpoint {0:?} contains the peer delimiter \"___\"")]
    DelimiterInEndpoint(String),

    #[error("self index {index} out of range for {peers} peers")]
    SelfIndexOutOfRange { index: u32, peers: usize },

    #[error("backend block is for {backend} but request is for {requested}")]
    BackendMismatch {
        requested: DatabaseKind,
        backend: DatabaseKind,
    },
}

/// Encode an ordered endpoint list into its wire string
///
/// Endpoints must be non-empty and must not contain [`PEER_DELIMITER`];
/// otherwise decoding could not reproduce the list.
pub fn encode_peer_list<S: AsRef<str>>(peers: &[S]) -> std::result::Result<String, ProtocolError> {
    for (i, peer) in peers.iter().enumerate() {
        let peer = peer.as_ref();
        if peer.is_empty() {
            return Err(ProtocolError::EmptyEndpoint(i));
        }
        if peer.contains(PEER_DELIMITER) {
            return Err(ProtocolError::DelimiterInEndpoint(peer.to_string()));
        }
    }

    Ok(peers
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(PEER_DELIMITER))
}

/// Decode a wire peer list, preserving order
pub fn decode_peer_list(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.split(PEER_DELIMITER).map(str::to_string).collect()
}

/// Client-side benchmark settings forwarded to every agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connections shared by the clients of one agent
    #[serde(default = "default_connections")]
    pub connections: i64,

    /// Concurrent clients per agent
    #[serde(default = "default_clients")]
    pub clients: i64,

    #[serde(default = "default_key_size")]
    pub key_size_bytes: i64,

    #[serde(default = "default_value_size")]
    pub value_size_bytes: i64,

    /// Total requests across the fleet; 0 runs until stopped
    #[serde(default)]
    pub total_requests: i64,

    /// Requests per second cap, if any
    #[serde(default)]
    pub rate_limit: Option<i64>,
}

fn default_connections() -> i64 {
    1
}

fn default_clients() -> i64 {
    1
}

fn default_key_size() -> i64 {
    256
}

fn default_value_size() -> i64 {
    1024
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connections: default_connections(),
            clients: default_clients(),
            key_size_bytes: default_key_size(),
            value_size_bytes: default_value_size(),
            total_requests: 0,
            rate_limit: None,
        }
    }
}

/// Request sent from the coordinator to one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub operation: Operation,

    /// Ask the agent to upload its logs (Stop only)
    pub trigger_log_upload: bool,

    pub database_kind: DatabaseKind,

    /// Free-form label used when comparing runs
    pub database_tag: String,

    /// Ordered peer endpoints, see [`encode_peer_list`]
    pub peer_list: String,

    /// Position of the receiving agent in `peer_list`
    pub self_index: u32,

    /// Clients the fleet runs at this step
    pub client_count: i64,

    pub client_config: ClientConfig,

    /// Exactly one backend block, matching `database_kind`
    pub backend: BackendConfig,
}

impl ControlRequest {
    /// Decoded peer list
    pub fn peers(&self) -> Vec<String> {
        decode_peer_list(&self.peer_list)
    }

    /// Endpoint of the receiving agent
    pub fn self_peer(&self) -> std::result::Result<String, ProtocolError> {
        let mut peers = self.peers();
        let count = peers.len();
        let index = self.self_index as usize;
        if index >= count {
            return Err(ProtocolError::SelfIndexOutOfRange {
                index: self.self_index,
                peers: count,
            });
        }
        Ok(peers.swap_remove(index))
    }

    /// Check the index and backend invariants
    pub fn validate(&self) -> std::result::Result<(), ProtocolError> {
        self.self_peer()?;

        let backend = self.backend.kind();
        if backend != self.database_kind {
            return Err(ProtocolError::BackendMismatch {
                requested: self.database_kind,
                backend,
            });
        }
        Ok(())
    }
}

/// Agent reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,

    /// On-disk footprint of the database, measured after shutdown.
    /// Only meaningful in a reply to Stop.
    pub disk_usage_bytes: i64,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            disk_usage_bytes: 0,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            disk_usage_bytes: 0,
        }
    }
}

/// Serialize a message to a length-prefixed frame
pub fn serialize_message<M: Serialize>(msg: &M) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec_named(msg).context("Failed to serialize message")?;

    if msg_bytes.len() > MAX_MESSAGE_BYTES {
        anyhow::bail!(
            "Message too large: {} bytes (max {})",
            msg_bytes.len(),
            MAX_MESSAGE_BYTES
        );
    }

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Read one framed message from a stream
pub async fn read_message<M, R>(stream: &mut R) -> Result<M>
where
    M: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_BYTES {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, MAX_MESSAGE_BYTES);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write one framed message to a stream and flush it
pub async fn write_message<M, W>(stream: &mut W, msg: &M) -> Result<()>
where
    M: Serialize,
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;

    stream
        .write_all(&framed)
        .await
        .context("Failed to write message")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}
