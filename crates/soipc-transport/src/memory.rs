//! In-memory transports for testing
//!
//! [`MemoryChannel`] mirrors the unix channel's addressing model: client
//! channels are named with the daemon's prefix and looked up on send.
//! Tests connect clients with [`MemoryChannel::connect`] and drive the
//! daemon without touching the filesystem or the network.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use soipc_core::ClientId;
use tokio::sync::{mpsc, Mutex};

use crate::adapter::{LocalChannel, NetworkEndpoint};
use crate::error::TransportError;

/// In-memory local channel
pub struct MemoryChannel {
    prefix: String,
    daemon_tx: mpsc::UnboundedSender<Bytes>,
    daemon_rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    clients: RwLock<HashMap<String, mpsc::UnboundedSender<Bytes>>>,
}

impl MemoryChannel {
    pub fn new(prefix: &str) -> Arc<Self> {
        let (daemon_tx, daemon_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            prefix: prefix.to_string(),
            daemon_tx,
            daemon_rx: Mutex::new(daemon_rx),
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Connect a test client, registering its channel under the name the
    /// daemon will derive for `client`
    pub fn connect(&self, client: ClientId) -> MemoryClientHandle {
        let channel = self.channel_name(client);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().insert(channel.clone(), tx);
        MemoryClientHandle {
            channel,
            daemon_tx: self.daemon_tx.clone(),
            rx,
        }
    }

    /// Drop a client's channel (simulates the client going away)
    pub fn disconnect(&self, client: ClientId) {
        let channel = self.channel_name(client);
        self.clients.write().remove(&channel);
    }
}

#[async_trait]
impl LocalChannel for MemoryChannel {
    async fn recv(&self) -> Result<Bytes, TransportError> {
        self.daemon_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn send_to(&self, channel: &str, data: &[u8]) -> Result<(), TransportError> {
        let clients = self.clients.read();
        let tx = clients
            .get(channel)
            .ok_or_else(|| TransportError::UnknownDestination(channel.to_string()))?;
        tx.send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::Closed)
    }

    fn channel_name(&self, client: ClientId) -> String {
        format!("{}-{:04x}", self.prefix, client.0)
    }
}

/// A test client connected to a [`MemoryChannel`]
pub struct MemoryClientHandle {
    channel: String,
    daemon_tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryClientHandle {
    /// The channel name this client is registered under
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Send a datagram to the daemon's channel
    pub fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.daemon_tx
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::Closed)
    }

    /// Receive the next datagram addressed to this client
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

/// In-memory network endpoint
///
/// Outbound datagrams are collected for inspection; inbound datagrams are
/// injected by the test.
pub struct MemoryNetwork {
    addr: SocketAddr,
    inject_tx: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
    inject_rx: Mutex<mpsc::UnboundedReceiver<(Bytes, SocketAddr)>>,
    sent: RwLock<Vec<(SocketAddr, Bytes)>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            addr: "127.0.0.1:30490".parse().expect("valid address"),
            inject_tx,
            inject_rx: Mutex::new(inject_rx),
            sent: RwLock::new(Vec::new()),
        })
    }

    /// Inject an inbound datagram as if it arrived from `from`
    pub fn inject(&self, data: &[u8], from: SocketAddr) {
        let _ = self.inject_tx.send((Bytes::copy_from_slice(data), from));
    }

    /// Datagrams sent so far, in order
    pub fn sent(&self) -> Vec<(SocketAddr, Bytes)> {
        self.sent.read().clone()
    }
}

#[async_trait]
impl NetworkEndpoint for MemoryNetwork {
    async fn recv(&self) -> Result<(Bytes, SocketAddr), TransportError> {
        self.inject_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<(), TransportError> {
        self.sent.write().push((addr, Bytes::copy_from_slice(data)));
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_to_daemon_and_back() {
        let channel = MemoryChannel::new("/tmp/soipc");
        let mut client = channel.connect(ClientId(5));

        client.send(b"hello").unwrap();
        let received = channel.recv().await.unwrap();
        assert_eq!(received.as_ref(), b"hello");

        channel.send_to(client.channel(), b"world").await.unwrap();
        assert_eq!(client.recv().await.unwrap().as_ref(), b"world");
    }

    #[tokio::test]
    async fn send_to_unknown_channel_fails() {
        let channel = MemoryChannel::new("/tmp/soipc");
        let err = channel.send_to("/tmp/soipc-ffff", b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownDestination(_)));
    }

    #[tokio::test]
    async fn network_collects_sent_and_delivers_injected() {
        let network = MemoryNetwork::new();
        let peer: SocketAddr = "10.0.0.2:30490".parse().unwrap();

        network.send_to(peer, b"out").await.unwrap();
        assert_eq!(network.sent(), vec![(peer, Bytes::from_static(b"out"))]);

        network.inject(b"in", peer);
        let (data, from) = network.recv().await.unwrap();
        assert_eq!(data.as_ref(), b"in");
        assert_eq!(from, peer);
    }
}
