//! Sender-Side Path Building
//!
//! Turns a planned path (directory records, in hop order) into a layered
//! envelope and injects it at the first relay. The sender holds every layer
//! key only transiently during construction; nothing persists after the
//! envelope is built.

use tracing::info;
use veilnet_crypto::{build_envelope, NodeId, PathHop, PublicKey};
use veilnet_directory::NodeRecord;

use crate::client::{send_layer, DirectoryClient};
use crate::error::{CoreError, CoreResult};
use crate::portmap::PortMap;
use crate::REQUEST_TIMEOUT;

/// Build an envelope for a path of directory records.
///
/// Returns the envelope and the first hop's id; the first hop is where the
/// caller transmits the envelope, its address never being part of the
/// ciphertext.
pub fn build_for_path(
    records: &[NodeRecord],
    destination: NodeId,
    message: &str,
) -> CoreResult<(String, NodeId)> {
    let path = records
        .iter()
        .map(|record| {
            Ok(PathHop {
                id: record.id,
                public_key: PublicKey::from_base64(&record.public_key)?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let envelope = build_envelope(&path, destination, message)?;
    Ok((envelope, records[0].id))
}

/// A sender bound to one directory and one address scheme
pub struct Sender {
    client: DirectoryClient,
    portmap: PortMap,
}

impl Sender {
    pub fn new(client: DirectoryClient, portmap: PortMap) -> Self {
        Self { client, portmap }
    }

    /// Route `message` to `destination` through the relays in `path_ids`,
    /// in order. Every id must be registered; the envelope goes to the
    /// first relay and the call returns once that relay acknowledges it.
    pub async fn send(
        &self,
        path_ids: &[NodeId],
        destination: NodeId,
        message: &str,
    ) -> CoreResult<NodeId> {
        let mut records = Vec::with_capacity(path_ids.len());
        for id in path_ids {
            records.push(self.client.lookup(*id).await?);
        }

        let (envelope, first_hop) = build_for_path(&records, destination, message)?;
        let addr = self.portmap.relay_addr(first_hop)?;

        info!(
            first_hop,
            destination,
            hops = path_ids.len(),
            envelope_chars = envelope.len(),
            "sending envelope"
        );
        send_layer(addr, envelope, REQUEST_TIMEOUT).await?;
        Ok(first_hop)
    }
}
