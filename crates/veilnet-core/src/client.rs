//! Directory Client
//!
//! UDP request/response against the directory server, one datagram each
//! way, every exchange bounded by a timeout. Wire-level error responses are
//! mapped back to typed errors using the request context (the client knows
//! which id it asked about).

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;
use veilnet_crypto::NodeId;
use veilnet_directory::{DirectoryError, NodeRecord};

use crate::error::{CoreError, CoreResult};
use crate::protocol::{
    deserialize_message, serialize_message, ErrorCode, LayerRequest, LookupRequest,
    RegisterRequest, WireMessage,
};
use crate::{MAX_DATAGRAM, REQUEST_TIMEOUT};

/// Client handle for one directory server
pub struct DirectoryClient {
    socket: UdpSocket,
    server_addr: SocketAddr,
    timeout: Duration,
}

impl DirectoryClient {
    /// Bind an ephemeral local socket talking to `server_addr`
    pub async fn connect(server_addr: SocketAddr) -> CoreResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self {
            socket,
            server_addr,
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Liveness probe
    pub async fn status(&self) -> CoreResult<()> {
        match self.request(&WireMessage::Status).await? {
            WireMessage::StatusLive => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Register a node's public key. `DuplicateNodeId` if the id is taken.
    pub async fn register(&self, id: NodeId, public_key: String) -> CoreResult<NodeRecord> {
        let msg = WireMessage::Register(RegisterRequest { id, public_key });
        match self.request(&msg).await? {
            WireMessage::RegisterAck(record) => {
                debug!(node_id = id, "registered with directory");
                Ok(record)
            }
            WireMessage::Error(err) if err.code == ErrorCode::DuplicateNodeId => {
                Err(DirectoryError::DuplicateNodeId(id).into())
            }
            WireMessage::Error(err) => Err(CoreError::Remote(err.message)),
            other => Err(unexpected(other)),
        }
    }

    /// Fetch the full registry snapshot
    pub async fn list_nodes(&self) -> CoreResult<Vec<NodeRecord>> {
        match self.request(&WireMessage::ListNodes).await? {
            WireMessage::NodeList(list) => Ok(list.nodes),
            WireMessage::Error(err) => Err(CoreError::Remote(err.message)),
            other => Err(unexpected(other)),
        }
    }

    /// Look up one node by id
    pub async fn lookup(&self, id: NodeId) -> CoreResult<NodeRecord> {
        match self.request(&WireMessage::Lookup(LookupRequest { id })).await? {
            WireMessage::NodeInfo(record) => Ok(record),
            WireMessage::Error(err) if err.code == ErrorCode::NodeNotFound => {
                Err(DirectoryError::NodeNotFound(id).into())
            }
            WireMessage::Error(err) => Err(CoreError::Remote(err.message)),
            other => Err(unexpected(other)),
        }
    }

    async fn request(&self, msg: &WireMessage) -> CoreResult<WireMessage> {
        let data = serialize_message(msg).map_err(|e| CoreError::Protocol(e.to_string()))?;
        self.socket.send_to(&data, self.server_addr).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, _from) = timeout(self.timeout, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| CoreError::Timeout)??;

        deserialize_message(&buf[..n]).map_err(|e| CoreError::Protocol(e.to_string()))
    }
}

fn unexpected(msg: WireMessage) -> CoreError {
    CoreError::Protocol(format!("unexpected response: {msg:?}"))
}

/// Send one envelope layer to `addr` and wait for the ack, bounded by
/// `bound`. Used both by the sender (initial injection) and by relays
/// (forwarding the remainder).
pub async fn send_layer(addr: SocketAddr, ciphertext: String, bound: Duration) -> CoreResult<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let msg = WireMessage::Layer(LayerRequest { ciphertext });
    let data = serialize_message(&msg).map_err(|e| CoreError::Protocol(e.to_string()))?;
    socket.send_to(&data, addr).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let (n, _from) = timeout(bound, socket.recv_from(&mut buf))
        .await
        .map_err(|_| CoreError::Timeout)??;

    match deserialize_message(&buf[..n]).map_err(|e| CoreError::Protocol(e.to_string()))? {
        WireMessage::LayerAck => Ok(()),
        WireMessage::Error(err) => Err(CoreError::Remote(err.message)),
        other => Err(unexpected(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorResponse, NodeListResponse};
    use veilnet_directory::NodeStore;

    /// Minimal in-test directory responder speaking the wire protocol.
    async fn spawn_stub_directory() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let store = NodeStore::new();

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                let (n, from) = socket.recv_from(&mut buf).await.unwrap();
                let reply = match deserialize_message(&buf[..n]).unwrap() {
                    WireMessage::Status => WireMessage::StatusLive,
                    WireMessage::Register(req) => {
                        match store.register(req.id, req.public_key) {
                            Ok(record) => WireMessage::RegisterAck(record),
                            Err(e) => WireMessage::Error(ErrorResponse {
                                code: ErrorCode::DuplicateNodeId,
                                message: e.to_string(),
                            }),
                        }
                    }
                    WireMessage::ListNodes => WireMessage::NodeList(NodeListResponse {
                        nodes: store.list(),
                    }),
                    WireMessage::Lookup(req) => match store.lookup(req.id) {
                        Ok(record) => WireMessage::NodeInfo(record),
                        Err(e) => WireMessage::Error(ErrorResponse {
                            code: ErrorCode::NodeNotFound,
                            message: e.to_string(),
                        }),
                    },
                    _ => continue,
                };
                let data = serialize_message(&reply).unwrap();
                socket.send_to(&data, from).await.unwrap();
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_register_list_lookup() {
        let addr = spawn_stub_directory().await;
        let client = DirectoryClient::connect(addr).await.unwrap();

        client.status().await.unwrap();

        let record = client.register(1, "pk-one".into()).await.unwrap();
        assert_eq!(record.id, 1);

        client.register(2, "pk-two".into()).await.unwrap();

        let nodes = client.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);

        let looked_up = client.lookup(2).await.unwrap();
        assert_eq!(looked_up.public_key, "pk-two");
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_are_typed() {
        let addr = spawn_stub_directory().await;
        let client = DirectoryClient::connect(addr).await.unwrap();

        client.register(5, "pk".into()).await.unwrap();
        let dup = client.register(5, "pk-again".into()).await;
        assert!(matches!(
            dup,
            Err(CoreError::Directory(DirectoryError::DuplicateNodeId(5)))
        ));

        let missing = client.lookup(42).await;
        assert!(matches!(
            missing,
            Err(CoreError::Directory(DirectoryError::NodeNotFound(42)))
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // A bound socket that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let client = DirectoryClient::connect(addr)
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(100));

        let result = client.status().await;
        assert!(matches!(result, Err(CoreError::Timeout)));
    }
}
