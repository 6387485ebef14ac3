//! UDP network endpoint

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::adapter::NetworkEndpoint;
use crate::config::default_recv_buffer;
use crate::error::TransportError;

/// Unicast UDP endpoint
pub struct UdpEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    recv_buffer: usize,
}

impl UdpEndpoint {
    /// Bind the unicast address
    pub async fn bind(unicast: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(unicast)
            .await
            .map_err(|e| TransportError::Bind(e.to_string()))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::Bind(e.to_string()))?;
        debug!(%local_addr, "network endpoint bound");
        Ok(Self {
            socket,
            local_addr,
            recv_buffer: default_recv_buffer(),
        })
    }
}

#[async_trait]
impl NetworkEndpoint for UdpEndpoint {
    async fn recv(&self) -> Result<(Bytes, SocketAddr), TransportError> {
        let mut buf = BytesMut::zeroed(self.recv_buffer);
        let (n, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        buf.truncate(n);
        Ok((buf.freeze(), from))
    }

    async fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(data, addr)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
