//! Transport configuration types

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Local channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LocalConfig {
    /// Unix datagram sockets under the configured prefix
    Unix(UnixConfig),
    /// In-memory channel for testing
    Memory(MemoryConfig),
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::Unix(UnixConfig::default())
    }
}

/// Unix datagram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnixConfig {
    /// Receive buffer size in bytes
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
}

impl Default for UnixConfig {
    fn default() -> Self {
        Self {
            recv_buffer: default_recv_buffer(),
        }
    }
}

pub(crate) fn default_recv_buffer() -> usize {
    65536
}

/// Network endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NetworkConfig {
    /// UDP unicast endpoint
    Udp(UdpConfig),
    /// In-memory endpoint for testing
    Memory(MemoryConfig),
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::Udp(UdpConfig::default())
    }
}

/// UDP endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpConfig {
    /// Unicast address to bind
    #[serde(default = "default_unicast")]
    pub unicast: SocketAddr,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            unicast: default_unicast(),
        }
    }
}

fn default_unicast() -> SocketAddr {
    "127.0.0.1:30490".parse().expect("valid default address")
}

/// In-memory transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {}
