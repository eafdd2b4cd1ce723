//! Relay Node Operations
//!
//! A relay owns one key pair for its lifetime, registers its public half
//! with the directory, and peels one envelope layer per incoming message.
//! Messages are independent: there is no circuit state between them, only a
//! diagnostic observation snapshot overwritten on each layer.

use tokio::sync::RwLock;
use tracing::{debug, info};
use veilnet_crypto::{peel_layer, KeyPair, NodeId, PeeledLayer};
use veilnet_directory::{NodeRecord, NodeStore};

use crate::client::DirectoryClient;
use crate::error::{CoreError, CoreResult};
use crate::protocol::ObservationReport;

/// Relay lifecycle: registration happens once, serving is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Unregistered,
    Registered,
    Serving,
}

/// Per-relay diagnostic state, overwritten on every incoming layer
pub type ObservationState = ObservationReport;

/// One relay node
pub struct Relay {
    node_id: NodeId,
    keypair: KeyPair,
    state: RwLock<RelayState>,
    observation: RwLock<ObservationState>,
}

impl Relay {
    /// Create a relay with a freshly generated key pair
    pub fn new(node_id: NodeId) -> CoreResult<Self> {
        let keypair = KeyPair::generate()?;
        Ok(Self {
            node_id,
            keypair,
            state: RwLock::new(RelayState::Unregistered),
            observation: RwLock::new(ObservationState::default()),
        })
    }

    /// This relay's node id
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The published form of this relay's public key
    pub fn public_key_base64(&self) -> CoreResult<String> {
        Ok(self.keypair.public.to_base64()?)
    }

    /// Current lifecycle state
    pub async fn state(&self) -> RelayState {
        *self.state.read().await
    }

    /// Register with a remote directory. A single attempt: on failure the
    /// relay stays Unregistered and the caller is expected to abort.
    pub async fn register(&self, client: &DirectoryClient) -> CoreResult<NodeRecord> {
        let public_key = self.public_key_base64()?;
        let record = client.register(self.node_id, public_key).await?;
        self.transition_registered().await;
        Ok(record)
    }

    /// Register against an in-process store (isolated setups and tests)
    pub async fn register_local(&self, store: &NodeStore) -> CoreResult<NodeRecord> {
        let public_key = self.public_key_base64()?;
        let record = store.register(self.node_id, public_key)?;
        self.transition_registered().await;
        Ok(record)
    }

    async fn transition_registered(&self) {
        let mut state = self.state.write().await;
        *state = RelayState::Registered;
        info!(node_id = self.node_id, "relay registered");
    }

    /// Enter the Serving state once the listener is bound. Serving is
    /// terminal until process shutdown.
    pub async fn mark_serving(&self) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if *state != RelayState::Registered {
            return Err(CoreError::NotServing);
        }
        *state = RelayState::Serving;
        info!(node_id = self.node_id, "relay serving");
        Ok(())
    }

    /// Peel one incoming layer and record the observation snapshot.
    ///
    /// Forwarding the remainder to `next_hop` is the listener's concern;
    /// peeling itself is pure.
    pub async fn receive_layer(&self, layer: &str) -> CoreResult<PeeledLayer> {
        if self.state().await != RelayState::Serving {
            return Err(CoreError::NotServing);
        }

        let peeled = peel_layer(&self.keypair.private, layer)?;
        debug!(
            node_id = self.node_id,
            next_hop = peeled.next_hop,
            "peeled one layer"
        );

        let mut observation = self.observation.write().await;
        *observation = ObservationState {
            last_ciphertext: Some(layer.to_string()),
            last_plaintext: Some(peeled.remainder.clone()),
            next_hop: Some(peeled.next_hop),
        };

        Ok(peeled)
    }

    /// Diagnostic snapshot of the most recent layer
    pub async fn observation(&self) -> ObservationState {
        self.observation.read().await.clone()
    }

    /// Export the private key. Deliberately insecure; exists only for test
    /// harnesses and is compiled out of production builds.
    #[cfg(feature = "debug-export")]
    pub fn export_private_key(&self) -> CoreResult<String> {
        Ok(self.keypair.private.to_base64()?)
    }
}
