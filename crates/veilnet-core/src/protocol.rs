//! Wire Protocol Messages
//!
//! One bincode-framed message per UDP datagram, request/response. Keys and
//! ciphertexts travel as base64 text inside the messages; envelope layers
//! are opaque strings at this level.

use serde::{Deserialize, Serialize};
use veilnet_crypto::NodeId;
use veilnet_directory::NodeRecord;

/// Protocol message types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireMessage {
    // === Liveness ===
    /// Is the node up?
    Status,
    StatusLive,

    // === Directory ===
    /// Register a node's public key under its id
    Register(RegisterRequest),
    RegisterAck(NodeRecord),

    /// Request the full registry snapshot
    ListNodes,
    NodeList(NodeListResponse),

    /// Look up a single node
    Lookup(LookupRequest),
    NodeInfo(NodeRecord),

    // === Relay / destination ===
    /// One envelope layer (or, at a destination, the delivered plaintext)
    Layer(LayerRequest),
    LayerAck,

    /// Read a relay's diagnostic snapshot
    GetObservation,
    Observation(ObservationReport),

    /// Read a destination's last delivered plaintext
    GetLastMessage,
    LastMessage(Option<String>),

    /// Debug escape hatch: export the relay's private key
    GetPrivateKey,
    PrivateKey(String),

    // === Error ===
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub id: NodeId,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListResponse {
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LookupRequest {
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRequest {
    pub ciphertext: String,
}

/// A relay's per-message diagnostic state, overwritten on each layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationReport {
    pub last_ciphertext: Option<String>,
    pub last_plaintext: Option<String>,
    pub next_hop: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    DuplicateNodeId,
    NodeNotFound,
    DecryptionFailed,
    MalformedLayer,
    Unsupported,
    Internal,
}

/// Serialize a message to datagram bytes
pub fn serialize_message(msg: &WireMessage) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(msg)
}

/// Deserialize a message from datagram bytes
pub fn deserialize_message(data: &[u8]) -> Result<WireMessage, bincode::Error> {
    bincode::deserialize(data)
}
