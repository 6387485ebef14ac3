//! Unix datagram local channel
//!
//! The daemon binds `{prefix}-0000` exclusively; clients bind their own
//! sockets at `{prefix}-{client:04x}` and the daemon addresses them by
//! path. Datagram sockets keep the message-queue framing: one datagram,
//! one frame.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use soipc_core::ClientId;
use tokio::net::UnixDatagram;
use tracing::debug;

use crate::adapter::LocalChannel;
use crate::config::UnixConfig;
use crate::error::TransportError;

/// Local channel over unix datagram sockets
pub struct UnixChannel {
    prefix: String,
    path: PathBuf,
    socket: UnixDatagram,
    recv_buffer: usize,
}

impl UnixChannel {
    /// Bind the daemon's channel at `{prefix}-0000`
    ///
    /// A stale socket file from a previous run is removed first; failing to
    /// bind is fatal for the daemon (it cannot operate without its control
    /// channel).
    pub async fn bind(prefix: &str, config: &UnixConfig) -> Result<Self, TransportError> {
        let path = PathBuf::from(channel_path(prefix, ClientId::DAEMON));
        // Remove leftovers from an unclean shutdown.
        let _ = std::fs::remove_file(&path);
        let socket =
            UnixDatagram::bind(&path).map_err(|e| TransportError::Bind(e.to_string()))?;
        debug!(path = %path.display(), recv_buffer = config.recv_buffer, "local channel bound");
        Ok(Self {
            prefix: prefix.to_string(),
            path,
            socket,
            recv_buffer: config.recv_buffer,
        })
    }
}

fn channel_path(prefix: &str, client: ClientId) -> String {
    format!("{}-{:04x}", prefix, client.0)
}

#[async_trait]
impl LocalChannel for UnixChannel {
    async fn recv(&self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::zeroed(self.recv_buffer);
        let n = self
            .socket
            .recv(&mut buf)
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        buf.truncate(n);
        Ok(buf.freeze())
    }

    async fn send_to(&self, channel: &str, data: &[u8]) -> Result<(), TransportError> {
        let n = self
            .socket
            .send_to(data, channel)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                    TransportError::UnknownDestination(channel.to_string())
                }
                _ => TransportError::Send(e.to_string()),
            })?;
        if n != data.len() {
            return Err(TransportError::Send(format!(
                "short write: {} of {} bytes",
                n,
                data.len()
            )));
        }
        Ok(())
    }

    fn channel_name(&self, client: ClientId) -> String {
        channel_path(&self.prefix, client)
    }
}

impl Drop for UnixChannel {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_recv_and_send_to_client() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("soipc").to_string_lossy().to_string();

        let daemon = UnixChannel::bind(&prefix, &UnixConfig::default())
            .await
            .unwrap();
        let client_path = daemon.channel_name(ClientId(5));
        let client = UnixDatagram::bind(&client_path).unwrap();

        client
            .send_to(b"hello", daemon.channel_name(ClientId::DAEMON))
            .await
            .unwrap();
        let received = daemon.recv().await.unwrap();
        assert_eq!(received.as_ref(), b"hello");

        daemon.send_to(&client_path, b"world").await.unwrap();
        let mut buf = [0u8; 16];
        let n = client.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[tokio::test]
    async fn rebind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("soipc").to_string_lossy().to_string();

        let first = UnixChannel::bind(&prefix, &UnixConfig::default())
            .await
            .unwrap();
        std::mem::forget(first); // leave the socket file behind
        UnixChannel::bind(&prefix, &UnixConfig::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn configured_recv_buffer_takes_effect() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("soipc").to_string_lossy().to_string();

        let daemon = UnixChannel::bind(&prefix, &UnixConfig { recv_buffer: 100 })
            .await
            .unwrap();
        let client = UnixDatagram::unbound().unwrap();

        // A datagram larger than the buffer is truncated to it.
        client
            .send_to(&[0xabu8; 4096], daemon.channel_name(ClientId::DAEMON))
            .await
            .unwrap();
        let received = daemon.recv().await.unwrap();
        assert_eq!(received.len(), 100);
    }

    #[tokio::test]
    async fn send_to_missing_client_is_unknown_destination() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("soipc").to_string_lossy().to_string();

        let daemon = UnixChannel::bind(&prefix, &UnixConfig::default())
            .await
            .unwrap();
        let err = daemon
            .send_to(&daemon.channel_name(ClientId(9)), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownDestination(_)));
    }
}
