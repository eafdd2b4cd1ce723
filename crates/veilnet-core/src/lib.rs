//! Veilnet Core Protocol
//!
//! Implements the overlay's moving parts on top of the crypto and directory
//! crates:
//! - Wire protocol messages and framing
//! - Directory client (register, list, lookup over UDP)
//! - Relay lifecycle, peel-and-observe, forwarding support
//! - Sender-side path building and envelope injection
//! - Hop id to socket address mapping

pub mod client;
pub mod error;
pub mod portmap;
pub mod protocol;
pub mod relay;
pub mod sender;

pub use client::{send_layer, DirectoryClient};
pub use error::{CoreError, CoreResult};
pub use portmap::PortMap;
pub use protocol::{deserialize_message, serialize_message, WireMessage};
pub use relay::{ObservationState, Relay, RelayState};
pub use sender::{build_for_path, Sender};

use std::time::Duration;

/// Default directory server port
pub const DEFAULT_DIRECTORY_PORT: u16 = 8080;

/// Relay `n` listens on this port plus its node id
pub const RELAY_PORT_BASE: u16 = 4000;

/// Destination `n` listens on this port plus its node id
pub const DEST_PORT_BASE: u16 = 3000;

/// Bound on every request/response exchange
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on forwarding a peeled layer to the next hop
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive buffer size, large enough for any envelope we build
pub const MAX_DATAGRAM: usize = 65536;
