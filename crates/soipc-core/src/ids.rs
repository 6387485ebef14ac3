//! Identifier handles for the routing tables.
//!
//! All identifiers are opaque fixed-width numeric handles in distinct
//! namespaces. They carry no structure beyond equality and ordering; the
//! daemon never derives meaning from their numeric value (with the single
//! exception of [`ClientId::DAEMON`], which is reserved for the daemon
//! itself and can never be registered by an application).

use serde::{Deserialize, Serialize};

/// Identifies a registered application (local) or a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u16);

impl ClientId {
    /// Reserved identity of the routing daemon itself.
    pub const DAEMON: ClientId = ClientId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identifies a service interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub u16);

impl ServiceId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identifies one concrete instance of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u16);

impl InstanceId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identifies a method within a (service, instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId(pub u16);

impl MethodId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identifies an event (or field, when its last value is cached).
///
/// Events share the method namespace on the wire: a notification frame
/// carries the event id in the header's method position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u16);

impl EventId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// The method-position value this event occupies in a notification
    /// frame header.
    pub const fn as_method(self) -> MethodId {
        MethodId(self.0)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identifies a subscription bundle of events/fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventgroupId(pub u16);

impl EventgroupId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EventgroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(ClientId(5).to_string(), "0x0005");
        assert_eq!(ServiceId(0x1234).to_string(), "0x1234");
        assert_eq!(EventId(0xBEEF).to_string(), "0xbeef");
    }

    #[test]
    fn event_maps_into_method_namespace() {
        assert_eq!(EventId(0x8001).as_method(), MethodId(0x8001));
    }

    #[test]
    fn daemon_id_is_zero() {
        assert_eq!(ClientId::DAEMON, ClientId(0));
    }
}
