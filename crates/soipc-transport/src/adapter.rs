//! Transport adapter traits

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use soipc_core::ClientId;

use crate::error::TransportError;

/// Daemon-side local IPC endpoint
///
/// One daemon instance owns and binds exactly one local channel. Client
/// channels live in the same namespace and are addressed by names derived
/// from the daemon's configured prefix via [`LocalChannel::channel_name`].
#[async_trait]
pub trait LocalChannel: Send + Sync {
    /// Receive the next datagram sent to the daemon's channel.
    ///
    /// Cancel-safe: the daemon's receiver context awaits this in a loop and
    /// is aborted on shutdown.
    async fn recv(&self) -> Result<Bytes, TransportError>;

    /// Send a datagram to the named client channel.
    async fn send_to(&self, channel: &str, data: &[u8]) -> Result<(), TransportError>;

    /// The channel name a client is expected to have bound, derived from
    /// the daemon's prefix.
    fn channel_name(&self, client: ClientId) -> String;
}

/// Unicast network endpoint for reaching remote peers
#[async_trait]
pub trait NetworkEndpoint: Send + Sync {
    /// Receive the next datagram and its source address.
    async fn recv(&self) -> Result<(Bytes, SocketAddr), TransportError>;

    /// Send a datagram to a remote peer.
    async fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<(), TransportError>;

    /// The locally bound unicast address.
    fn local_addr(&self) -> SocketAddr;
}
