//! Core error types

use thiserror::Error;
use veilnet_crypto::{CryptoError, NodeId};
use veilnet_directory::DirectoryError;

/// Errors surfaced by the core overlay operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A request/response exchange exceeded its bound
    #[error("Request timed out")]
    Timeout,

    /// Framing failure or an unexpected response message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The next hop could not be resolved or contacted
    #[error("Next hop {0} is unreachable: {1}")]
    UnreachableHop(NodeId, String),

    /// The relay has not reached the Serving state
    #[error("Relay is not serving")]
    NotServing,

    /// The remote peer reported a failure we have no richer mapping for
    #[error("Remote error: {0}")]
    Remote(String),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
