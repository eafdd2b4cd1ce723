//! Veilnet Relay Daemon
//!
//! One onion hop: generates its key pair, registers with the directory
//! (single attempt, aborts on failure), then serves envelope layers,
//! peeling one layer per message and forwarding the remainder to the next
//! hop fire-and-forget under a bounded timeout.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use veilnet_core::protocol::{
    deserialize_message, serialize_message, ErrorCode, ErrorResponse, WireMessage,
};
use veilnet_core::{
    send_layer, CoreError, DirectoryClient, PortMap, Relay, DEFAULT_DIRECTORY_PORT,
    FORWARD_TIMEOUT, MAX_DATAGRAM,
};
use veilnet_crypto::{CryptoError, NodeId};
use veilnet_directory::DirectoryError;

/// Veilnet Relay Daemon
#[derive(Parser)]
#[command(name = "veilnet-relayd")]
#[command(author, version, about)]
struct Cli {
    /// This relay's node id; also selects its listen port
    #[arg(short, long)]
    id: NodeId,

    /// Directory server address
    #[arg(short, long, default_value_t = default_directory())]
    directory: SocketAddr,

    /// Host relays and destinations are reachable on
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn default_directory() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_DIRECTORY_PORT))
}

/// Relay daemon state
struct RelayServer {
    socket: Arc<UdpSocket>,
    relay: Arc<Relay>,
    directory: SocketAddr,
    portmap: PortMap,
}

impl RelayServer {
    async fn run(&self) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    if let Err(e) = self.handle_packet(&buf[..n], from).await {
                        warn!("Error handling packet from {}: {}", from, e);
                    }
                }
                Err(e) => {
                    error!("Receive error: {}", e);
                }
            }
        }
    }

    async fn handle_packet(&self, data: &[u8], from: SocketAddr) -> Result<()> {
        let msg = match deserialize_message(data) {
            Ok(m) => m,
            Err(e) => {
                debug!("Failed to deserialize message from {}: {}", from, e);
                return Ok(());
            }
        };

        let reply = match msg {
            WireMessage::Status => WireMessage::StatusLive,
            WireMessage::Layer(req) => match self.relay.receive_layer(&req.ciphertext).await {
                Ok(peeled) => {
                    self.spawn_forward(peeled.next_hop, peeled.remainder);
                    WireMessage::LayerAck
                }
                Err(e) => {
                    warn!("Failed to peel layer from {}: {}", from, e);
                    error_reply(peel_error_code(&e), e)
                }
            },
            WireMessage::GetObservation => WireMessage::Observation(self.relay.observation().await),
            WireMessage::GetPrivateKey => self.private_key_reply(),
            other => {
                debug!("Unsupported message from {}: {:?}", from, other);
                WireMessage::Error(ErrorResponse {
                    code: ErrorCode::Unsupported,
                    message: "not a relay request".into(),
                })
            }
        };

        let data = serialize_message(&reply)?;
        self.socket.send_to(&data, from).await?;
        Ok(())
    }

    /// Forward a peeled remainder to the next hop. Fire-and-forget: the
    /// task is bounded by `FORWARD_TIMEOUT`, failures are logged and
    /// dropped, nothing propagates back to the sender.
    fn spawn_forward(&self, next_hop: NodeId, remainder: String) {
        let relay_id = self.relay.node_id();
        let directory = self.directory;
        let portmap = self.portmap;

        tokio::spawn(async move {
            let addr = match resolve_next_hop(directory, &portmap, next_hop).await {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(relay_id, next_hop, "cannot resolve next hop: {}", e);
                    return;
                }
            };

            match send_layer(addr, remainder, FORWARD_TIMEOUT).await {
                Ok(()) => debug!(relay_id, next_hop, %addr, "forwarded remainder"),
                Err(e) => warn!(relay_id, next_hop, %addr, "forward failed: {}", e),
            }
        });
    }

    #[cfg(feature = "debug-export")]
    fn private_key_reply(&self) -> WireMessage {
        match self.relay.export_private_key() {
            Ok(key) => WireMessage::PrivateKey(key),
            Err(e) => error_reply(ErrorCode::Internal, e),
        }
    }

    #[cfg(not(feature = "debug-export"))]
    fn private_key_reply(&self) -> WireMessage {
        WireMessage::Error(ErrorResponse {
            code: ErrorCode::Unsupported,
            message: "private key export is not compiled in".into(),
        })
    }
}

/// A registered id is a relay at its relay port; an unknown id is assumed
/// to be a destination listener.
async fn resolve_next_hop(
    directory: SocketAddr,
    portmap: &PortMap,
    next_hop: NodeId,
) -> Result<SocketAddr, CoreError> {
    let client = DirectoryClient::connect(directory).await?;
    match client.lookup(next_hop).await {
        Ok(_) => portmap.relay_addr(next_hop),
        Err(CoreError::Directory(DirectoryError::NodeNotFound(_))) => {
            portmap.dest_addr(next_hop)
        }
        Err(e) => Err(CoreError::UnreachableHop(next_hop, e.to_string())),
    }
}

fn peel_error_code(err: &CoreError) -> ErrorCode {
    match err {
        CoreError::Crypto(CryptoError::DecryptionFailed) => ErrorCode::DecryptionFailed,
        CoreError::Crypto(_) => ErrorCode::MalformedLayer,
        _ => ErrorCode::Internal,
    }
}

fn error_reply(code: ErrorCode, err: impl std::fmt::Display) -> WireMessage {
    WireMessage::Error(ErrorResponse {
        code,
        message: err.to_string(),
    })
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_log_level(&cli.log_level))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let portmap = PortMap {
        host: cli.host,
        ..PortMap::default()
    };

    info!("Starting veilnet relay {}...", cli.id);

    let relay = Arc::new(Relay::new(cli.id).context("key generation failed")?);

    // Single registration attempt; a relay the directory refuses must not
    // serve traffic.
    let client = DirectoryClient::connect(cli.directory).await?;
    relay
        .register(&client)
        .await
        .context("directory registration failed, aborting")?;

    let listen_addr = portmap.relay_addr(cli.id)?;
    let socket = UdpSocket::bind(listen_addr)
        .await
        .with_context(|| format!("cannot bind {listen_addr}"))?;
    relay.mark_serving().await?;
    info!("Relay {} listening on {}", cli.id, listen_addr);

    let server = RelayServer {
        socket: Arc::new(socket),
        relay,
        directory: cli.directory,
        portmap,
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Relay {} stopped", cli.id);
    Ok(())
}
