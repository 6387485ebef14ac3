//! Channel router
//!
//! The bidirectional method-ownership index: which client serves which
//! (service, instance, method), and which methods a client has claimed.
//! Both directions are kept as composite-keyed maps and only ever mutated
//! together, so the mirrored-entry invariant holds structurally: an entry
//! exists in one map iff its mirror exists in the other.

use std::collections::{BTreeMap, BTreeSet};

use soipc_core::{ClientId, InstanceId, MethodId, ServiceId};

/// Bidirectional (client ⇄ service, instance, method) index
#[derive(Debug, Default)]
pub struct ChannelRouter {
    by_client: BTreeMap<(ClientId, ServiceId, InstanceId), BTreeSet<MethodId>>,
    by_method: BTreeMap<(ServiceId, InstanceId, MethodId), ClientId>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a method for a client. A later claim for the same method by
    /// another client takes over the service-keyed side; the previous
    /// owner's client-keyed entry is removed to keep the index mirrored.
    pub fn register(
        &mut self,
        client: ClientId,
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    ) {
        if let Some(previous) = self.by_method.insert((service, instance, method), client) {
            if previous != client {
                self.drop_client_entry(previous, service, instance, method);
            }
        }
        self.by_client
            .entry((client, service, instance))
            .or_default()
            .insert(method);
    }

    /// Release a method claim. Both directions are removed as a unit; a
    /// deregistration by a non-owner is a no-op.
    pub fn deregister(
        &mut self,
        client: ClientId,
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    ) {
        if self.by_method.get(&(service, instance, method)) != Some(&client) {
            return;
        }
        self.by_method.remove(&(service, instance, method));
        self.drop_client_entry(client, service, instance, method);
    }

    /// Remove every claim held by a client (deregistration cascade)
    pub fn remove_client(&mut self, client: ClientId) {
        let keys: Vec<_> = self
            .by_client
            .range((client, ServiceId(u16::MIN), InstanceId(u16::MIN))..)
            .take_while(|((c, _, _), _)| *c == client)
            .map(|(key, methods)| (*key, methods.clone()))
            .collect();
        for ((_, service, instance), methods) in keys {
            for method in methods {
                self.by_method.remove(&(service, instance, method));
            }
            self.by_client.remove(&(client, service, instance));
        }
    }

    /// Find the local owner of a method. Absence is a valid outcome.
    pub fn find_local(
        &self,
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    ) -> Option<ClientId> {
        self.by_method.get(&(service, instance, method)).copied()
    }

    fn drop_client_entry(
        &mut self,
        client: ClientId,
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    ) {
        if let Some(methods) = self.by_client.get_mut(&(client, service, instance)) {
            methods.remove(&method);
            if methods.is_empty() {
                self.by_client.remove(&(client, service, instance));
            }
        }
    }

    /// Check the mirrored-entry invariant in both directions
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let forward = self.by_client.iter().all(|((client, service, instance), methods)| {
            methods.iter().all(|method| {
                self.by_method.get(&(*service, *instance, *method)) == Some(client)
            })
        });
        let backward = self
            .by_method
            .iter()
            .all(|((service, instance, method), client)| {
                self.by_client
                    .get(&(*client, *service, *instance))
                    .is_some_and(|methods| methods.contains(method))
            });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: ServiceId = ServiceId(100);
    const I: InstanceId = InstanceId(1);

    #[test]
    fn register_creates_mirrored_entries() {
        let mut router = ChannelRouter::new();
        router.register(ClientId(5), S, I, MethodId(0x21));
        assert_eq!(router.find_local(S, I, MethodId(0x21)), Some(ClientId(5)));
        assert!(router.is_consistent());
    }

    #[test]
    fn deregister_removes_both_directions() {
        let mut router = ChannelRouter::new();
        router.register(ClientId(5), S, I, MethodId(0x21));
        router.deregister(ClientId(5), S, I, MethodId(0x21));
        assert_eq!(router.find_local(S, I, MethodId(0x21)), None);
        assert!(router.is_consistent());
    }

    #[test]
    fn deregister_by_non_owner_is_a_no_op() {
        let mut router = ChannelRouter::new();
        router.register(ClientId(5), S, I, MethodId(0x21));
        router.deregister(ClientId(6), S, I, MethodId(0x21));
        assert_eq!(router.find_local(S, I, MethodId(0x21)), Some(ClientId(5)));
        assert!(router.is_consistent());
    }

    #[test]
    fn takeover_keeps_index_mirrored() {
        let mut router = ChannelRouter::new();
        router.register(ClientId(5), S, I, MethodId(0x21));
        router.register(ClientId(6), S, I, MethodId(0x21));
        assert_eq!(router.find_local(S, I, MethodId(0x21)), Some(ClientId(6)));
        assert!(router.is_consistent());
    }

    #[test]
    fn remove_client_drops_all_claims() {
        let mut router = ChannelRouter::new();
        router.register(ClientId(5), S, I, MethodId(0x21));
        router.register(ClientId(5), S, I, MethodId(0x22));
        router.register(ClientId(5), ServiceId(200), I, MethodId(0x01));
        router.register(ClientId(6), S, I, MethodId(0x23));

        router.remove_client(ClientId(5));

        assert_eq!(router.find_local(S, I, MethodId(0x21)), None);
        assert_eq!(router.find_local(S, I, MethodId(0x22)), None);
        assert_eq!(router.find_local(ServiceId(200), I, MethodId(0x01)), None);
        assert_eq!(router.find_local(S, I, MethodId(0x23)), Some(ClientId(6)));
        assert!(router.is_consistent());
    }

    #[test]
    fn invariant_holds_under_interleaved_operations() {
        let mut router = ChannelRouter::new();
        for round in 0u16..4 {
            for m in 0u16..8 {
                router.register(ClientId(5 + (m % 3)), S, I, MethodId(m));
            }
            assert!(router.is_consistent());
            for m in (0u16..8).step_by(2) {
                router.deregister(ClientId(5 + (m % 3)), S, I, MethodId(m));
            }
            assert!(router.is_consistent());
            if round % 2 == 0 {
                router.remove_client(ClientId(6));
                assert!(router.is_consistent());
            }
        }
    }
}
