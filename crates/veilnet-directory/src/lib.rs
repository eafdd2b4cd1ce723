//! Veilnet Node Directory
//!
//! The in-memory registry mapping node ids to published public keys. The
//! sender plans paths from its listing; relays register themselves into it
//! on startup. The store is an explicit object with its own lifecycle so
//! several independent directories can coexist (and be torn down) in one
//! process.

pub mod error;
pub mod store;

pub use error::{DirectoryError, DirectoryResult};
pub use store::{NodeRecord, NodeStore};
