//! Directory error types

use thiserror::Error;
use veilnet_crypto::NodeId;

/// Errors that can occur against the node directory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// A record with this id is already registered
    #[error("Node {0} is already registered")]
    DuplicateNodeId(NodeId),

    /// No record with this id exists
    #[error("Node {0} is not registered")]
    NodeNotFound(NodeId),
}

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;
