//! Veilnet Client
//!
//! Operator CLI for the overlay: inspect the directory, route a message
//! through a chosen relay path, or run a destination listener that records
//! the plaintext delivered by the final hop.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use veilnet_core::protocol::{
    deserialize_message, serialize_message, ErrorCode, ErrorResponse, WireMessage,
};
use veilnet_core::{
    DirectoryClient, PortMap, Sender, DEFAULT_DIRECTORY_PORT, MAX_DATAGRAM,
};
use veilnet_crypto::NodeId;

/// Veilnet Client
#[derive(Parser)]
#[command(name = "veilnet-client")]
#[command(author, version, about)]
struct Cli {
    /// Directory server address
    #[arg(short, long, default_value_t = default_directory())]
    directory: SocketAddr,

    /// Host relays and destinations are reachable on
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered relay nodes
    Nodes,

    /// Route a message through a relay path to a destination
    Send {
        /// Relay ids in hop order, comma separated (e.g. 1,2,3)
        #[arg(short, long, value_delimiter = ',', required = true)]
        path: Vec<NodeId>,

        /// Destination node id
        #[arg(long)]
        dest: NodeId,

        /// Message text
        #[arg(short, long)]
        message: String,
    },

    /// Run a destination listener under the given id
    Listen {
        /// Destination id; selects the listen port
        #[arg(short, long)]
        id: NodeId,
    },
}

fn default_directory() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_DIRECTORY_PORT))
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

async fn cmd_nodes(directory: SocketAddr) -> Result<()> {
    let client = DirectoryClient::connect(directory).await?;
    let nodes = client.list_nodes().await?;

    if nodes.is_empty() {
        println!("no nodes registered");
        return Ok(());
    }
    for node in nodes {
        println!("{:>10}  {}", node.id, node.public_key);
    }
    Ok(())
}

async fn cmd_send(
    directory: SocketAddr,
    portmap: PortMap,
    path: Vec<NodeId>,
    dest: NodeId,
    message: String,
) -> Result<()> {
    let client = DirectoryClient::connect(directory).await?;
    let sender = Sender::new(client, portmap);

    let first_hop = sender.send(&path, dest, &message).await?;
    println!(
        "sent {} characters to destination {} via {} hops (entry relay {})",
        message.len(),
        dest,
        path.len(),
        first_hop
    );
    Ok(())
}

/// Destination endpoint: accepts the plaintext remainder delivered by the
/// final relay and keeps the most recent one for inspection.
async fn cmd_listen(portmap: PortMap, id: NodeId) -> Result<()> {
    let listen_addr = portmap.dest_addr(id)?;
    let socket = UdpSocket::bind(listen_addr).await?;
    info!("Destination {} listening on {}", id, listen_addr);

    let last_message: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (n, from) = tokio::select! {
            received = socket.recv_from(&mut buf) => received?,
            _ = tokio::signal::ctrl_c() => {
                info!("Destination {} stopped", id);
                return Ok(());
            }
        };

        let reply = match deserialize_message(&buf[..n]) {
            Ok(WireMessage::Status) => WireMessage::StatusLive,
            Ok(WireMessage::Layer(req)) => {
                info!("Delivered to {}: {:?}", id, req.ciphertext);
                *last_message.write().await = Some(req.ciphertext);
                WireMessage::LayerAck
            }
            Ok(WireMessage::GetLastMessage) => {
                WireMessage::LastMessage(last_message.read().await.clone())
            }
            Ok(other) => {
                debug!("Unsupported message from {}: {:?}", from, other);
                WireMessage::Error(ErrorResponse {
                    code: ErrorCode::Unsupported,
                    message: "not a destination request".into(),
                })
            }
            Err(e) => {
                debug!("Failed to deserialize message from {}: {}", from, e);
                continue;
            }
        };

        let data = serialize_message(&reply)?;
        if let Err(e) = socket.send_to(&data, from).await {
            warn!("Failed to reply to {}: {}", from, e);
        }
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

    match cli.command {
        Command::Nodes => cmd_nodes(cli.directory).await,
        Command::Send {
            path,
            dest,
            message,
        } => cmd_send(cli.directory, portmap, path, dest, message).await,
        Command::Listen { id } => cmd_listen(portmap, id).await,
    }
}
