//! Service directory
//!
//! Tracks which client or remote endpoint currently provides each
//! (service, instance), and which requesters are waiting for availability.
//! Requests persist across service absence: a requester stays subscribed
//! to availability changes until it explicitly releases, so providers can
//! come and go without the requester re-asking.

use std::collections::{BTreeMap, BTreeSet};

use soipc_core::{ClientId, InstanceId, ServiceId};

use crate::endpoints::EndpointId;
use crate::error::RoutingError;

/// Current provider of a (service, instance)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// A registered local application
    Local(ClientId),
    /// A remote peer, per reliability class
    Remote {
        reliable: Option<EndpointId>,
        unreliable: Option<EndpointId>,
    },
}

/// "Notify this client when this service becomes available", unique per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestInfo {
    pub client: ClientId,
    pub service: ServiceId,
    pub instance: InstanceId,
}

/// Provider records and retained availability requests
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    providers: BTreeMap<(ServiceId, InstanceId), Provider>,
    requests: BTreeSet<RequestInfo>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local provider, replacing any previous provider. Returns
    /// the requesters to notify of the (possibly changed) availability.
    pub fn provide_local(
        &mut self,
        client: ClientId,
        service: ServiceId,
        instance: InstanceId,
    ) -> Vec<ClientId> {
        self.providers.insert((service, instance), Provider::Local(client));
        self.requesters(service, instance)
    }

    /// Record a remote provider endpoint for one reliability class,
    /// merging with an existing remote record. Returns the requesters to
    /// notify.
    pub fn provide_remote(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        endpoint: EndpointId,
        is_reliable: bool,
    ) -> Vec<ClientId> {
        let entry = self
            .providers
            .entry((service, instance))
            .or_insert(Provider::Remote {
                reliable: None,
                unreliable: None,
            });
        // A remote announcement displaces a stale local record.
        if matches!(entry, Provider::Local(_)) {
            *entry = Provider::Remote {
                reliable: None,
                unreliable: None,
            };
        }
        if let Provider::Remote {
            reliable,
            unreliable,
        } = entry
        {
            if is_reliable {
                *reliable = Some(endpoint);
            } else {
                *unreliable = Some(endpoint);
            }
        }
        self.requesters(service, instance)
    }

    /// Remove a local provider record. The caller must own it; the
    /// retained requests are returned for unavailability notification.
    pub fn withdraw_local(
        &mut self,
        client: ClientId,
        service: ServiceId,
        instance: InstanceId,
    ) -> Result<Vec<ClientId>, RoutingError> {
        match self.providers.get(&(service, instance)) {
            Some(Provider::Local(owner)) if *owner == client => {
                self.providers.remove(&(service, instance));
                Ok(self.requesters(service, instance))
            }
            _ => Err(RoutingError::UnknownService(service, instance)),
        }
    }

    /// Remove a remote provider record (service-discovery "unavailable")
    pub fn withdraw_remote(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
    ) -> Vec<ClientId> {
        if matches!(
            self.providers.get(&(service, instance)),
            Some(Provider::Remote { .. })
        ) {
            self.providers.remove(&(service, instance));
        }
        self.requesters(service, instance)
    }

    /// Insert a request entry. Idempotent: re-requesting is a no-op.
    /// Returns true if the entry was new.
    pub fn request(
        &mut self,
        client: ClientId,
        service: ServiceId,
        instance: InstanceId,
    ) -> bool {
        self.requests.insert(RequestInfo {
            client,
            service,
            instance,
        })
    }

    /// Remove a request entry
    pub fn release(&mut self, client: ClientId, service: ServiceId, instance: InstanceId) {
        self.requests.remove(&RequestInfo {
            client,
            service,
            instance,
        });
    }

    /// Current provider of a (service, instance)
    pub fn provider(&self, service: ServiceId, instance: InstanceId) -> Option<Provider> {
        self.providers.get(&(service, instance)).copied()
    }

    /// All provider records, in key order (catch-up replay)
    pub fn providers(&self) -> impl Iterator<Item = ((ServiceId, InstanceId), Provider)> + '_ {
        self.providers.iter().map(|(key, provider)| (*key, *provider))
    }

    /// Remote endpoint for a (service, instance), preferring the requested
    /// reliability class. Pure lookup; absence is a valid outcome.
    pub fn find_remote(
        &self,
        service: ServiceId,
        instance: InstanceId,
        is_reliable: bool,
    ) -> Option<EndpointId> {
        match self.providers.get(&(service, instance))? {
            Provider::Remote {
                reliable,
                unreliable,
            } => {
                if is_reliable {
                    reliable.or(*unreliable)
                } else {
                    unreliable.or(*reliable)
                }
            }
            Provider::Local(_) => None,
        }
    }

    /// Requesters currently subscribed to a (service, instance)
    pub fn requesters(&self, service: ServiceId, instance: InstanceId) -> Vec<ClientId> {
        self.requests
            .iter()
            .filter(|r| r.service == service && r.instance == instance)
            .map(|r| r.client)
            .collect()
    }

    /// Deregistration cascade: drop the client's requests and withdraw its
    /// provided services, returning each withdrawn (service, instance)
    /// with the requesters to notify of unavailability.
    pub fn remove_client(
        &mut self,
        client: ClientId,
    ) -> Vec<(ServiceId, InstanceId, Vec<ClientId>)> {
        self.requests.retain(|r| r.client != client);

        let withdrawn: Vec<_> = self
            .providers
            .iter()
            .filter(|(_, provider)| **provider == Provider::Local(client))
            .map(|(key, _)| *key)
            .collect();
        withdrawn
            .into_iter()
            .map(|(service, instance)| {
                self.providers.remove(&(service, instance));
                (service, instance, self.requesters(service, instance))
            })
            .collect()
    }
}
