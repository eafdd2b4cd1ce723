//! Hop Id to Address Mapping
//!
//! The envelope carries node ids, never addresses; resolving an id to a
//! socket address is this value object's job. Relays listen at a base port
//! plus their id, destinations at a lower base plus theirs.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use veilnet_crypto::NodeId;

use crate::error::{CoreError, CoreResult};
use crate::{DEST_PORT_BASE, RELAY_PORT_BASE};

/// Address scheme for one overlay deployment
#[derive(Debug, Clone, Copy)]
pub struct PortMap {
    pub host: IpAddr,
    pub relay_base: u16,
    pub dest_base: u16,
}

impl Default for PortMap {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            relay_base: RELAY_PORT_BASE,
            dest_base: DEST_PORT_BASE,
        }
    }
}

impl PortMap {
    /// Address of relay `id`
    pub fn relay_addr(&self, id: NodeId) -> CoreResult<SocketAddr> {
        Ok(SocketAddr::new(self.host, self.port(self.relay_base, id)?))
    }

    /// Address of destination `id`
    pub fn dest_addr(&self, id: NodeId) -> CoreResult<SocketAddr> {
        Ok(SocketAddr::new(self.host, self.port(self.dest_base, id)?))
    }

    fn port(&self, base: u16, id: NodeId) -> CoreResult<u16> {
        u32::from(base)
            .checked_add(id)
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| {
                CoreError::UnreachableHop(id, format!("id overflows port base {base}"))
            })
    }
}
