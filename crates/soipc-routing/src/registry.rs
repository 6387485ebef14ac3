//! Client registry
//!
//! Tracks registered local applications and their liveness. The registry
//! itself only stores per-application state; cascading cleanup on
//! deregistration is orchestrated by the dispatcher, which owns the other
//! tables.

use std::collections::BTreeMap;

use soipc_codec::ApplicationEntry;
use soipc_core::ClientId;

use crate::error::RoutingError;

/// Liveness state driven by the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Answered (or not yet asked for) the current cycle's ping
    Active,
    /// Pinged this cycle, pong outstanding
    AwaitingPong,
}

/// One registered application
#[derive(Debug, Clone)]
pub struct ApplicationInfo {
    pub name: String,
    pub managing: bool,
    pub liveness: Liveness,
}

/// Registered local applications, keyed by client id
#[derive(Debug, Default)]
pub struct ApplicationRegistry {
    apps: BTreeMap<ClientId, ApplicationInfo>,
}

impl ApplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new application. Re-registration of a live id fails
    /// rather than silently overwriting.
    pub fn register(
        &mut self,
        client: ClientId,
        name: &str,
        managing: bool,
    ) -> Result<(), RoutingError> {
        if client == ClientId::DAEMON || self.apps.contains_key(&client) {
            return Err(RoutingError::DuplicateRegistration(client));
        }
        self.apps.insert(
            client,
            ApplicationInfo {
                name: name.to_string(),
                managing,
                liveness: Liveness::Active,
            },
        );
        Ok(())
    }

    /// Remove an application, returning its info if it was registered
    pub fn deregister(&mut self, client: ClientId) -> Option<ApplicationInfo> {
        self.apps.remove(&client)
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.apps.contains_key(&client)
    }

    pub fn get(&self, client: ClientId) -> Option<&ApplicationInfo> {
        self.apps.get(&client)
    }

    /// All registered client ids, in id order
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.apps.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Snapshot of the registry for `ApplicationInfo` messages
    pub fn snapshot(&self) -> Vec<ApplicationEntry> {
        self.apps
            .iter()
            .map(|(client, info)| ApplicationEntry {
                client: *client,
                managing: info.managing,
                name: info.name.clone(),
            })
            .collect()
    }

    /// Mark every application as awaiting a pong for the new cycle,
    /// returning the pinged clients
    pub fn mark_all_awaiting(&mut self) -> Vec<ClientId> {
        for info in self.apps.values_mut() {
            info.liveness = Liveness::AwaitingPong;
        }
        self.apps.keys().copied().collect()
    }

    /// Record a pong. Returns false for unknown clients: a pong arriving
    /// after the grace window already reaped the client is not a
    /// resurrection.
    pub fn mark_alive(&mut self, client: ClientId) -> bool {
        match self.apps.get_mut(&client) {
            Some(info) => {
                info.liveness = Liveness::Active;
                true
            }
            None => false,
        }
    }

    /// Clients that did not answer the current cycle's ping
    pub fn awaiting(&self) -> Vec<ClientId> {
        self.apps
            .iter()
            .filter(|(_, info)| info.liveness == Liveness::AwaitingPong)
            .map(|(client, _)| *client)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ApplicationRegistry::new();
        registry.register(ClientId(5), "nav", false).unwrap();
        let err = registry.register(ClientId(5), "nav2", false).unwrap_err();
        assert_eq!(err, RoutingError::DuplicateRegistration(ClientId(5)));
        // The original registration is untouched.
        assert_eq!(registry.get(ClientId(5)).unwrap().name, "nav");
    }

    #[test]
    fn daemon_id_is_not_registrable() {
        let mut registry = ApplicationRegistry::new();
        let err = registry.register(ClientId::DAEMON, "evil", false).unwrap_err();
        assert_eq!(err, RoutingError::DuplicateRegistration(ClientId::DAEMON));
    }

    #[test]
    fn deregister_then_register_again_succeeds() {
        let mut registry = ApplicationRegistry::new();
        registry.register(ClientId(5), "nav", false).unwrap();
        assert!(registry.deregister(ClientId(5)).is_some());
        assert!(registry.deregister(ClientId(5)).is_none());
        registry.register(ClientId(5), "nav", false).unwrap();
    }

    #[test]
    fn watchdog_cycle_marks_and_pong_restores() {
        let mut registry = ApplicationRegistry::new();
        registry.register(ClientId(5), "nav", false).unwrap();
        registry.register(ClientId(6), "diag", true).unwrap();

        let pinged = registry.mark_all_awaiting();
        assert_eq!(pinged, vec![ClientId(5), ClientId(6)]);

        assert!(registry.mark_alive(ClientId(5)));
        assert_eq!(registry.awaiting(), vec![ClientId(6)]);

        // Pong from a never-registered client is ignored.
        assert!(!registry.mark_alive(ClientId(99)));
    }

    #[test]
    fn snapshot_is_ordered_by_client_id() {
        let mut registry = ApplicationRegistry::new();
        registry.register(ClientId(6), "diag", true).unwrap();
        registry.register(ClientId(5), "nav", false).unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].client, ClientId(5));
        assert_eq!(snapshot[1].client, ClientId(6));
        assert!(snapshot[1].managing);
    }
}
