//! soipc-transport - Transport layer for the soipc routing daemon
//!
//! This crate provides the two transport seams the daemon plugs into:
//! - [`LocalChannel`]: the daemon's message-queue-like IPC endpoint, bound
//!   exclusively by one daemon instance; client channels are addressed by
//!   names derived from a configured prefix.
//! - [`NetworkEndpoint`]: the unicast datagram socket used to reach remote
//!   peers.
//!
//! Implementations: unix datagram sockets ([`unix`]), UDP ([`udp`]), and an
//! in-memory pair for tests ([`memory`]).
//!
//! # Example
//!
//! ```ignore
//! use soipc_transport::{create_local_channel, LocalConfig};
//!
//! let config = LocalConfig::Memory(Default::default());
//! let channel = create_local_channel(&config, "/tmp/soipc").await?;
//! let frame = channel.recv().await?;
//! ```

mod adapter;
pub mod config;
pub mod error;
pub mod memory;
pub mod udp;
pub mod unix;

pub use adapter::{LocalChannel, NetworkEndpoint};
pub use config::{LocalConfig, MemoryConfig, NetworkConfig, UdpConfig, UnixConfig};
pub use error::TransportError;

use std::sync::Arc;

/// Create a local channel based on configuration, bound and ready to read
pub async fn create_local_channel(
    config: &LocalConfig,
    prefix: &str,
) -> Result<Arc<dyn LocalChannel>, TransportError> {
    match config {
        LocalConfig::Unix(cfg) => {
            let channel = unix::UnixChannel::bind(prefix, cfg).await?;
            Ok(Arc::new(channel))
        }
        LocalConfig::Memory(_) => Ok(memory::MemoryChannel::new(prefix)),
    }
}

/// Create a network endpoint based on configuration
pub async fn create_network(
    config: &NetworkConfig,
) -> Result<Arc<dyn NetworkEndpoint>, TransportError> {
    match config {
        NetworkConfig::Udp(cfg) => {
            let endpoint = udp::UdpEndpoint::bind(cfg.unicast).await?;
            Ok(Arc::new(endpoint))
        }
        NetworkConfig::Memory(_) => Ok(memory::MemoryNetwork::new()),
    }
}
