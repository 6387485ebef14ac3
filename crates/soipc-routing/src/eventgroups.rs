//! Eventgroup and field manager
//!
//! Subscription bundles plus the field cache. A field is the cached last
//! published value of an event: created on first publish, overwritten on
//! every subsequent publish, never implicitly deleted. Late-joining
//! subscribers get every cached member field replayed immediately; nobody
//! else is re-notified.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bytes::Bytes;
use soipc_core::{ClientId, EventId, EventgroupId, InstanceId, ServiceId};

/// One subscription bundle
#[derive(Debug, Default)]
pub struct EventgroupInfo {
    pub subscribers: BTreeSet<ClientId>,
    pub events: BTreeSet<EventId>,
}

/// Cached last-published value of an event
#[derive(Debug)]
pub struct FieldInfo {
    pub payload: Bytes,
    /// Clients the last publish was fanned out to. A delivery record, not
    /// an authority: fan-out is always recomputed from the groups, and
    /// unsubscribe does not rewrite this set.
    pub last_notified: BTreeSet<ClientId>,
}

/// Subscription groups and the global field cache
///
/// Both tables survive individual client disconnects; only subscriber
/// entries are removed on a deregistration cascade.
#[derive(Debug, Default)]
pub struct EventgroupManager {
    groups: BTreeMap<(ServiceId, InstanceId, EventgroupId), EventgroupInfo>,
    fields: HashMap<EventId, FieldInfo>,
}

impl EventgroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to a group, returning the cached member fields to
    /// replay to the new subscriber only
    pub fn subscribe(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        subscriber: ClientId,
    ) -> Vec<(EventId, Bytes)> {
        let group = self
            .groups
            .entry((service, instance, eventgroup))
            .or_default();
        group.subscribers.insert(subscriber);
        group
            .events
            .iter()
            .filter_map(|event| {
                self.fields
                    .get(event)
                    .map(|field| (*event, field.payload.clone()))
            })
            .collect()
    }

    /// Remove a subscriber from a group. The field cache is untouched.
    pub fn unsubscribe(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        subscriber: ClientId,
    ) {
        if let Some(group) = self.groups.get_mut(&(service, instance, eventgroup)) {
            group.subscribers.remove(&subscriber);
        }
    }

    /// Cache a field value and compute the fan-out set: the union of
    /// subscribers of every group containing the event. Publishing into a
    /// group implies the event's membership in it.
    pub fn publish(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        event: EventId,
        payload: Bytes,
    ) -> BTreeSet<ClientId> {
        self.groups
            .entry((service, instance, eventgroup))
            .or_default()
            .events
            .insert(event);

        let recipients: BTreeSet<ClientId> = self
            .groups
            .values()
            .filter(|group| group.events.contains(&event))
            .flat_map(|group| group.subscribers.iter().copied())
            .collect();

        self.fields.insert(
            event,
            FieldInfo {
                payload,
                last_notified: recipients.clone(),
            },
        );
        recipients
    }

    /// Cached field value, if the event has been published at least once
    pub fn field(&self, event: EventId) -> Option<&FieldInfo> {
        self.fields.get(&event)
    }

    /// Drop a client from every group's subscriber set (deregistration
    /// cascade). Field caches stay.
    pub fn remove_client(&mut self, client: ClientId) {
        for group in self.groups.values_mut() {
            group.subscribers.remove(&client);
        }
    }

    /// Non-empty groups and their subscribers, in key order (catch-up)
    pub fn subscriptions(
        &self,
    ) -> Vec<(ServiceId, InstanceId, EventgroupId, Vec<ClientId>)> {
        self.groups
            .iter()
            .filter(|(_, group)| !group.subscribers.is_empty())
            .map(|((service, instance, eventgroup), group)| {
                (
                    *service,
                    *instance,
                    *eventgroup,
                    group.subscribers.iter().copied().collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: ServiceId = ServiceId(100);
    const I: InstanceId = InstanceId(1);
    const G: EventgroupId = EventgroupId(7);
    const E: EventId = EventId(0x8001);

    #[test]
    fn late_join_replays_cached_fields_to_new_subscriber_only() {
        let mut manager = EventgroupManager::new();
        manager.subscribe(S, I, G, ClientId(6));
        let recipients = manager.publish(S, I, G, E, Bytes::from_static(b"v1"));
        assert_eq!(recipients, BTreeSet::from([ClientId(6)]));

        // Late joiner gets the cached value immediately.
        let replay = manager.subscribe(S, I, G, ClientId(7));
        assert_eq!(replay, vec![(E, Bytes::from_static(b"v1"))]);

        // An already-subscribed client re-subscribing gets the replay too,
        // but no publish-side fan-out happened.
        let replay = manager.subscribe(S, I, G, ClientId(6));
        assert_eq!(replay.len(), 1);
    }

    #[test]
    fn subscribe_before_any_publish_replays_nothing() {
        let mut manager = EventgroupManager::new();
        assert!(manager.subscribe(S, I, G, ClientId(6)).is_empty());
    }

    #[test]
    fn publish_overwrites_cache() {
        let mut manager = EventgroupManager::new();
        manager.publish(S, I, G, E, Bytes::from_static(b"v1"));
        manager.publish(S, I, G, E, Bytes::from_static(b"v2"));
        assert_eq!(manager.field(E).unwrap().payload, Bytes::from_static(b"v2"));
    }

    #[test]
    fn fan_out_is_union_across_groups_containing_event() {
        let mut manager = EventgroupManager::new();
        let g2 = EventgroupId(8);
        manager.subscribe(S, I, G, ClientId(6));
        manager.subscribe(S, I, g2, ClientId(7));
        // Event becomes a member of both groups.
        manager.publish(S, I, G, E, Bytes::from_static(b"v1"));
        let recipients = manager.publish(S, I, g2, E, Bytes::from_static(b"v2"));
        assert_eq!(recipients, BTreeSet::from([ClientId(6), ClientId(7)]));
    }

    #[test]
    fn unsubscribe_leaves_cache_and_delivery_record() {
        let mut manager = EventgroupManager::new();
        manager.subscribe(S, I, G, ClientId(6));
        manager.publish(S, I, G, E, Bytes::from_static(b"v1"));
        manager.unsubscribe(S, I, G, ClientId(6));

        // Cache survives; last_notified may lag the (now empty) union.
        let field = manager.field(E).unwrap();
        assert_eq!(field.payload, Bytes::from_static(b"v1"));
        assert_eq!(field.last_notified, BTreeSet::from([ClientId(6)]));

        // Next publish reaches nobody.
        let recipients = manager.publish(S, I, G, E, Bytes::from_static(b"v2"));
        assert!(recipients.is_empty());
    }

    #[test]
    fn remove_client_clears_subscriptions_but_not_fields() {
        let mut manager = EventgroupManager::new();
        manager.subscribe(S, I, G, ClientId(6));
        manager.publish(S, I, G, E, Bytes::from_static(b"v1"));

        manager.remove_client(ClientId(6));
        assert!(manager.subscriptions().is_empty());
        assert!(manager.field(E).is_some());
    }
}
