//! Veilnet Directory Server
//!
//! Long-lived registry of relay nodes: relays register their public keys
//! here, senders fetch the listing to plan paths. One UDP datagram per
//! request or response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use veilnet_core::protocol::{
    deserialize_message, serialize_message, ErrorCode, ErrorResponse, NodeListResponse,
    WireMessage,
};
use veilnet_core::{DEFAULT_DIRECTORY_PORT, MAX_DATAGRAM};
use veilnet_directory::{DirectoryError, NodeStore};

/// Veilnet Directory Server
#[derive(Parser)]
#[command(name = "veilnet-directoryd")]
#[command(author, version, about)]
struct Cli {
    /// Listen address for UDP
    #[arg(short, long, default_value_t = default_listen())]
    listen: SocketAddr,

    /// Stats reporting interval (seconds)
    #[arg(long, default_value = "60")]
    stats_interval: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_DIRECTORY_PORT))
}

/// Directory server state
struct DirectoryServer {
    socket: Arc<UdpSocket>,
    store: Arc<NodeStore>,
}

impl DirectoryServer {
    async fn new(listen_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(listen_addr).await?;
        info!("Directory server listening on {}", listen_addr);

        Ok(Self {
            socket: Arc::new(socket),
            store: Arc::new(NodeStore::new()),
        })
    }

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
            WireMessage::Register(req) => {
                info!("Register request for node {} from {}", req.id, from);
                match self.store.register(req.id, req.public_key) {
                    Ok(record) => WireMessage::RegisterAck(record),
                    Err(e @ DirectoryError::DuplicateNodeId(_)) => {
                        warn!("{}", e);
                        error_reply(ErrorCode::DuplicateNodeId, e)
                    }
                    Err(e) => error_reply(ErrorCode::Internal, e),
                }
            }
            WireMessage::ListNodes => {
                let nodes = self.store.list();
                debug!("Returning {} nodes to {}", nodes.len(), from);
                WireMessage::NodeList(NodeListResponse { nodes })
            }
            WireMessage::Lookup(req) => match self.store.lookup(req.id) {
                Ok(record) => WireMessage::NodeInfo(record),
                Err(e) => error_reply(ErrorCode::NodeNotFound, e),
            },
            other => {
                debug!("Unsupported message from {}: {:?}", from, other);
                WireMessage::Error(ErrorResponse {
                    code: ErrorCode::Unsupported,
                    message: "not a directory request".into(),
                })
            }
        };

        self.send_reply(&reply, from).await
    }

    async fn send_reply(&self, msg: &WireMessage, to: SocketAddr) -> Result<()> {
        let data = serialize_message(msg)?;
        self.socket.send_to(&data, to).await?;
        Ok(())
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

    info!("Starting veilnet directory server...");

    let server = Arc::new(DirectoryServer::new(cli.listen).await?);

    // Periodic registry size report
    let server_stats = Arc::clone(&server);
    let stats_interval = Duration::from_secs(cli.stats_interval);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(stats_interval);
        loop {
            interval.tick().await;
            info!("Stats: {} nodes registered", server_stats.store.len());
        }
    });

    let server_run = Arc::clone(&server);
    tokio::select! {
        result = server_run.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    server.store.clear();
    info!("Directory server stopped");
    Ok(())
}
