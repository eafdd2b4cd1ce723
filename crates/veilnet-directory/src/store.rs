//! Node registry store

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use veilnet_crypto::NodeId;

use crate::error::{DirectoryError, DirectoryResult};

/// One registered node: its id and its published public key, as exported
/// base64 text. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub public_key: String,
}

/// In-memory id -> record registry.
///
/// Registrations from concurrent handlers insert atomically; a snapshot
/// listing never observes a partially constructed record.
#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: DashMap<NodeId, NodeRecord>,
}

impl NodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Fails if the id is already taken; the existing
    /// record is left untouched.
    pub fn register(&self, id: NodeId, public_key: String) -> DirectoryResult<NodeRecord> {
        match self.nodes.entry(id) {
            Entry::Occupied(_) => Err(DirectoryError::DuplicateNodeId(id)),
            Entry::Vacant(slot) => {
                let record = NodeRecord { id, public_key };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    /// Snapshot of all records, sorted by id
    pub fn list(&self) -> Vec<NodeRecord> {
        let mut records: Vec<NodeRecord> =
            self.nodes.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Look up one record by id
    pub fn lookup(&self, id: NodeId) -> DirectoryResult<NodeRecord> {
        self.nodes
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(DirectoryError::NodeNotFound(id))
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Discard every record (teardown)
    pub fn clear(&self) {
        self.nodes.clear();
    }
}
