//! Provider locations carried by availability notifications.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Where a service provider can be reached.
///
/// Availability notifications carry the provider's location so a requester
/// learns, in one message, both that the service exists and how the daemon
/// will reach it. `Local` names the provider's channel on the daemon's IPC
/// endpoint; `Remote` names a network endpoint. `None` is the payload of an
/// unavailability notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Provided by a local application; `channel` is its IPC channel name.
    Local { channel: String },
    /// Provided by a remote peer.
    Remote { addr: SocketAddr, reliable: bool },
    /// No provider (unavailability notification).
    None,
}

impl Location {
    pub fn is_none(&self) -> bool {
        matches!(self, Location::None)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Local { channel } => write!(f, "local:{}", channel),
            Location::Remote { addr, reliable } => {
                write!(f, "remote:{}/{}", addr, if *reliable { "tcp" } else { "udp" })
            }
            Location::None => write!(f, "unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_distinguishes_kinds() {
        let local = Location::Local {
            channel: "/tmp/soipc-5".to_string(),
        };
        assert_eq!(local.to_string(), "local:/tmp/soipc-5");

        let remote = Location::Remote {
            addr: "10.0.0.1:30490".parse().unwrap(),
            reliable: false,
        };
        assert_eq!(remote.to_string(), "remote:10.0.0.1:30490/udp");

        assert!(Location::None.is_none());
    }
}
