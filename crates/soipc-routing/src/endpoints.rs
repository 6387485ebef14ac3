//! Endpoint registry
//!
//! Remote endpoints are interned once and referenced by an opaque
//! [`EndpointId`] everywhere else in the engine; the registry also keeps
//! the client-location map used to back-route responses to remote clients.
//! Nothing outside this table ever holds an address directly.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use soipc_core::ClientId;

/// Opaque handle to an interned remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub u32);

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ep#{}", self.0)
    }
}

/// Interning table for remote endpoints plus client locations
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    by_addr: HashMap<(SocketAddr, bool), EndpointId>,
    by_id: HashMap<EndpointId, (SocketAddr, bool)>,
    locations: BTreeMap<ClientId, EndpointId>,
    next: u32,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an endpoint, returning a stable id for (addr, reliable)
    pub fn intern(&mut self, addr: SocketAddr, reliable: bool) -> EndpointId {
        if let Some(id) = self.by_addr.get(&(addr, reliable)) {
            return *id;
        }
        let id = EndpointId(self.next);
        self.next += 1;
        self.by_addr.insert((addr, reliable), id);
        self.by_id.insert(id, (addr, reliable));
        id
    }

    /// Resolve an endpoint id back to its address and reliability
    pub fn resolve(&self, id: EndpointId) -> Option<(SocketAddr, bool)> {
        self.by_id.get(&id).copied()
    }

    /// Record where a remote client can be reached
    pub fn save_location(&mut self, client: ClientId, endpoint: EndpointId) {
        self.locations.insert(client, endpoint);
    }

    /// Endpoint of a remote client, if known
    pub fn location(&self, client: ClientId) -> Option<EndpointId> {
        self.locations.get(&client).copied()
    }

    /// Drop a client's location (deregistration cascade)
    pub fn remove_client(&mut self, client: ClientId) {
        self.locations.remove(&client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut registry = EndpointRegistry::new();
        let addr: SocketAddr = "10.0.0.1:30490".parse().unwrap();
        let a = registry.intern(addr, false);
        let b = registry.intern(addr, false);
        assert_eq!(a, b);
        assert_eq!(registry.resolve(a), Some((addr, false)));
    }

    #[test]
    fn reliability_distinguishes_endpoints() {
        let mut registry = EndpointRegistry::new();
        let addr: SocketAddr = "10.0.0.1:30490".parse().unwrap();
        let udp = registry.intern(addr, false);
        let tcp = registry.intern(addr, true);
        assert_ne!(udp, tcp);
    }

    #[test]
    fn client_locations_are_tracked_and_removed() {
        let mut registry = EndpointRegistry::new();
        let endpoint = registry.intern("10.0.0.1:30490".parse().unwrap(), false);
        registry.save_location(ClientId(7), endpoint);
        assert_eq!(registry.location(ClientId(7)), Some(endpoint));

        registry.remove_client(ClientId(7));
        assert_eq!(registry.location(ClientId(7)), None);
        // The endpoint itself stays interned.
        assert!(registry.resolve(endpoint).is_some());
    }
}
