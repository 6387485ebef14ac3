//! Command dispatcher and routing core
//!
//! [`RoutingCore`] owns every routing table and is driven exclusively by
//! the control task: completed reads and collaborator calls arrive as
//! [`ControlInput`] values, table mutations happen synchronously, and the
//! resulting [`Delivery`] jobs are handed to the sender and network
//! contexts. All non-fatal routing errors are logged and absorbed here;
//! a bad frame never stops the dispatch loop.

use std::net::SocketAddr;

use bytes::Bytes;
use soipc_codec::{
    decode_command, decode_frame, encode_command, encode_frame, Command, FrameHeader,
    MessageKind, Route,
};
use soipc_core::{ClientId, EventId, EventgroupId, InstanceId, Location, ServiceId};
use tracing::{debug, info, warn};

use crate::channels::ChannelRouter;
use crate::directory::{Provider, ServiceDirectory};
use crate::endpoints::EndpointRegistry;
use crate::error::RoutingError;
use crate::eventgroups::EventgroupManager;
use crate::registry::ApplicationRegistry;

/// One unit of work for the control task
#[derive(Debug)]
pub enum ControlInput {
    /// A completed read from the local channel
    LocalFrame(Bytes),
    /// A completed read from the network endpoint
    NetworkFrame { data: Bytes, from: SocketAddr },
    /// Service-discovery availability input
    RemoteAvailability {
        service: ServiceId,
        instance: InstanceId,
        location: Option<(SocketAddr, bool)>,
        available: bool,
    },
    /// Subscription change on behalf of a client
    Subscription {
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        subscriber: ClientId,
        subscribing: bool,
    },
    /// Field publish on behalf of a collaborator
    PublishField {
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        event: EventId,
        payload: Bytes,
    },
    /// Replay the full current state to one client
    CatchUp(ClientId),
    /// Watchdog: start a ping round
    WatchdogCycle,
    /// Watchdog: grace window expired, reap non-responders
    WatchdogCheck,
    /// Stop the control task
    Shutdown,
}

/// A delivery job produced by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Enqueue onto the local client's channel (sender context)
    Local { client: ClientId, bytes: Bytes },
    /// Transmit to a remote peer (network context)
    Remote { addr: SocketAddr, bytes: Bytes },
}

/// The routing engine: all tables, one owner
pub struct RoutingCore {
    channel_prefix: String,
    registry: ApplicationRegistry,
    directory: ServiceDirectory,
    channels: ChannelRouter,
    endpoints: EndpointRegistry,
    eventgroups: EventgroupManager,
    out: Vec<Delivery>,
}

impl RoutingCore {
    pub fn new(channel_prefix: &str) -> Self {
        Self {
            channel_prefix: channel_prefix.to_string(),
            registry: ApplicationRegistry::new(),
            directory: ServiceDirectory::new(),
            channels: ChannelRouter::new(),
            endpoints: EndpointRegistry::new(),
            eventgroups: EventgroupManager::new(),
            out: Vec::new(),
        }
    }

    /// Process one input, returning the deliveries it produced
    pub fn handle(&mut self, input: ControlInput) -> Vec<Delivery> {
        match input {
            ControlInput::LocalFrame(data) => self.on_local_frame(&data),
            ControlInput::NetworkFrame { data, from } => self.on_network_frame(data, from),
            ControlInput::RemoteAvailability {
                service,
                instance,
                location,
                available,
            } => self.on_remote_availability(service, instance, location, available),
            ControlInput::Subscription {
                service,
                instance,
                eventgroup,
                subscriber,
                subscribing,
            } => {
                if subscribing {
                    self.on_subscribe(service, instance, eventgroup, subscriber);
                } else {
                    self.eventgroups
                        .unsubscribe(service, instance, eventgroup, subscriber);
                }
            }
            ControlInput::PublishField {
                service,
                instance,
                eventgroup,
                event,
                payload,
            } => self.on_publish_field(service, instance, eventgroup, event, payload),
            ControlInput::CatchUp(client) => self.replay_state(client, true),
            ControlInput::WatchdogCycle => self.on_watchdog_cycle(),
            ControlInput::WatchdogCheck => self.on_watchdog_check(),
            ControlInput::Shutdown => {}
        }
        std::mem::take(&mut self.out)
    }

    // ---- frame handling ------------------------------------------------

    fn on_local_frame(&mut self, data: &[u8]) {
        let (sender, command) = match decode_command(data) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %RoutingError::MalformedFrame(e), "dropping local frame");
                return;
            }
        };

        match command {
            Command::RegisterApplication { name, managing } => {
                self.on_register_application(sender, &name, managing)
            }
            Command::DeregisterApplication => self.on_deregister_application(sender),
            Command::Pong => self.on_pong(sender),
            Command::ProvideService { service, instance } => {
                self.on_provide_service(sender, service, instance)
            }
            Command::WithdrawService { service, instance } => {
                self.on_withdraw_service(sender, service, instance)
            }
            Command::RequestService { service, instance } => {
                self.on_request_service(sender, service, instance)
            }
            Command::ReleaseService { service, instance } => {
                self.directory.release(sender, service, instance);
            }
            Command::RegisterMethod {
                service,
                instance,
                method,
            } => {
                self.channels.register(sender, service, instance, method);
                debug!(client = %sender, %service, %instance, %method, "method registered");
            }
            Command::DeregisterMethod {
                service,
                instance,
                method,
            } => {
                self.channels.deregister(sender, service, instance, method);
            }
            Command::SubscribeEventgroup {
                service,
                instance,
                eventgroup,
            } => self.on_subscribe(service, instance, eventgroup, sender),
            Command::UnsubscribeEventgroup {
                service,
                instance,
                eventgroup,
            } => {
                self.eventgroups
                    .unsubscribe(service, instance, eventgroup, sender);
            }
            Command::PublishField {
                service,
                instance,
                eventgroup,
                event,
                payload,
            } => self.on_publish_field(service, instance, eventgroup, event, payload),
            Command::ForwardMessage { frame } => self.route_frame(frame),
            // Daemon-originated commands are not accepted from clients.
            other => {
                warn!(client = %sender, opcode = other.opcode(), "unexpected command from client");
            }
        }
    }

    fn on_network_frame(&mut self, data: Bytes, from: SocketAddr) {
        // Remember where the remote sender lives so responses can route
        // back by client id alone.
        if let Ok((header, _)) = decode_frame(&data) {
            if header.is_request() {
                let endpoint = self.endpoints.intern(from, false);
                self.endpoints.save_location(header.client, endpoint);
            }
        }
        self.route_frame(data);
    }

    /// Route one RPC/event frame by header inspection alone
    fn route_frame(&mut self, raw: Bytes) {
        let header = match decode_frame(&raw) {
            Ok((header, _)) => header,
            Err(e) => {
                warn!(error = %RoutingError::MalformedFrame(e), "dropping routed frame");
                return;
            }
        };

        match header.classify() {
            Route::Forward => {
                // A method claim alone does not make a destination: the
                // provider record gates routing, so a withdrawn service
                // stops receiving calls even while its methods stay
                // claimed for the next provision.
                let local_owner = match self.directory.provider(header.service, header.instance) {
                    Some(Provider::Local(_)) => {
                        self.channels
                            .find_local(header.service, header.instance, header.method)
                    }
                    _ => None,
                };
                if let Some(owner) = local_owner {
                    self.deliver_frame(owner, raw);
                } else if let Some(addr) = self
                    .directory
                    .find_remote(header.service, header.instance, false)
                    .and_then(|id| self.endpoints.resolve(id))
                    .map(|(addr, _)| addr)
                {
                    self.out.push(Delivery::Remote { addr, bytes: raw });
                } else {
                    warn!(
                        error = %RoutingError::RoutingMiss {
                            service: header.service,
                            instance: header.instance,
                            method: header.method,
                        },
                        "dropping request"
                    );
                }
            }
            // Responses and notifications route back via the return-path
            // client id in the frame itself, never via the request table.
            Route::Return => self.deliver_frame(header.client, raw),
        }
    }

    /// Hand a routed frame to a client: local clients get it wrapped in a
    /// `ForwardMessage` command, remote clients get the raw frame.
    fn deliver_frame(&mut self, client: ClientId, raw: Bytes) {
        if self.registry.contains(client) {
            let wire = encode_command(ClientId::DAEMON, &Command::ForwardMessage { frame: raw });
            self.out.push(Delivery::Local {
                client,
                bytes: wire,
            });
        } else if let Some((addr, _)) = self
            .endpoints
            .location(client)
            .and_then(|id| self.endpoints.resolve(id))
        {
            self.out.push(Delivery::Remote { addr, bytes: raw });
        } else {
            warn!(error = %RoutingError::UnknownClient(client), "dropping frame");
        }
    }

    // ---- registration --------------------------------------------------

    fn on_register_application(&mut self, client: ClientId, name: &str, managing: bool) {
        if let Err(e) = self.registry.register(client, name, managing) {
            warn!(error = %e, "registration rejected");
            return;
        }
        info!(client = %client, name, managing, "application registered");

        // Everyone, the new client included, sees the updated registry.
        self.broadcast(&Command::ApplicationInfo {
            entries: self.registry.snapshot(),
        });

        // A managing client needs a consistent snapshot of the rest.
        if managing {
            self.replay_state(client, false);
        }
    }

    fn on_deregister_application(&mut self, client: ClientId) {
        if !self.cascade_removal(client) {
            warn!(error = %RoutingError::UnknownClient(client), "deregistration ignored");
            return;
        }
        info!(client = %client, "application deregistered");
        self.broadcast(&Command::ApplicationLost {
            clients: vec![client],
        });
    }

    /// Remove a client from every table. Returns false if it was not
    /// registered. Withdrawn services produce unavailability notifications;
    /// the `application_lost` broadcast is the caller's responsibility.
    fn cascade_removal(&mut self, client: ClientId) -> bool {
        if self.registry.deregister(client).is_none() {
            return false;
        }
        self.channels.remove_client(client);
        self.endpoints.remove_client(client);
        self.eventgroups.remove_client(client);
        for (service, instance, requesters) in self.directory.remove_client(client) {
            self.notify_availability(&requesters, service, instance, Location::None);
        }
        true
    }

    // ---- service directory ---------------------------------------------

    fn on_provide_service(&mut self, client: ClientId, service: ServiceId, instance: InstanceId) {
        if !self.registry.contains(client) {
            warn!(error = %RoutingError::UnknownClient(client), "provide_service ignored");
            return;
        }
        let requesters = self.directory.provide_local(client, service, instance);
        info!(client = %client, %service, %instance, "service provided");
        let location = Location::Local {
            channel: self.local_channel_name(client),
        };
        self.notify_availability(&requesters, service, instance, location);
    }

    fn on_withdraw_service(&mut self, client: ClientId, service: ServiceId, instance: InstanceId) {
        match self.directory.withdraw_local(client, service, instance) {
            Ok(requesters) => {
                info!(client = %client, %service, %instance, "service withdrawn");
                self.notify_availability(&requesters, service, instance, Location::None);
            }
            Err(e) => warn!(error = %e, "withdraw_service ignored"),
        }
    }

    fn on_request_service(&mut self, client: ClientId, service: ServiceId, instance: InstanceId) {
        self.directory.request(client, service, instance);
        // An already-available service answers immediately; the request
        // entry is retained either way.
        if let Some(location) = self
            .directory
            .provider(service, instance)
            .and_then(|p| self.provider_location(p))
        {
            self.notify_availability(&[client], service, instance, location);
        }
    }

    fn on_remote_availability(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        location: Option<(SocketAddr, bool)>,
        available: bool,
    ) {
        if available {
            let Some((addr, reliable)) = location else {
                warn!(%service, %instance, "remote availability without location");
                return;
            };
            let endpoint = self.endpoints.intern(addr, reliable);
            let requesters = self
                .directory
                .provide_remote(service, instance, endpoint, reliable);
            info!(%service, %instance, %addr, reliable, "remote service available");
            self.notify_availability(
                &requesters,
                service,
                instance,
                Location::Remote { addr, reliable },
            );
        } else {
            let requesters = self.directory.withdraw_remote(service, instance);
            info!(%service, %instance, "remote service unavailable");
            self.notify_availability(&requesters, service, instance, Location::None);
        }
    }

    fn notify_availability(
        &mut self,
        requesters: &[ClientId],
        service: ServiceId,
        instance: InstanceId,
        location: Location,
    ) {
        for requester in requesters {
            self.send_command(
                *requester,
                &Command::ServiceAvailability {
                    service,
                    instance,
                    location: location.clone(),
                },
            );
        }
    }

    fn provider_location(&self, provider: Provider) -> Option<Location> {
        match provider {
            Provider::Local(client) => Some(Location::Local {
                channel: self.local_channel_name(client),
            }),
            Provider::Remote {
                reliable,
                unreliable,
            } => unreliable
                .map(|id| (id, false))
                .or(reliable.map(|id| (id, true)))
                .and_then(|(id, is_reliable)| {
                    self.endpoints
                        .resolve(id)
                        .map(|(addr, _)| Location::Remote {
                            addr,
                            reliable: is_reliable,
                        })
                }),
        }
    }

    // ---- eventgroups & fields ------------------------------------------

    fn on_subscribe(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        subscriber: ClientId,
    ) {
        let replay = self
            .eventgroups
            .subscribe(service, instance, eventgroup, subscriber);
        debug!(client = %subscriber, %service, %instance, %eventgroup,
               cached = replay.len(), "subscribed");
        // Late-join replay: cached member fields go to the new subscriber
        // only.
        for (event, payload) in replay {
            self.send_notification(subscriber, service, instance, event, &payload);
        }
    }

    fn on_publish_field(
        &mut self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        event: EventId,
        payload: Bytes,
    ) {
        let recipients = self
            .eventgroups
            .publish(service, instance, eventgroup, event, payload.clone());
        debug!(
            %service, %instance, %eventgroup, %event,
            recipients = recipients.len(),
            payload = %hex::encode(&payload[..payload.len().min(16)]),
            "field published"
        );
        for recipient in recipients {
            self.send_notification(recipient, service, instance, event, &payload);
        }
    }

    fn send_notification(
        &mut self,
        recipient: ClientId,
        service: ServiceId,
        instance: InstanceId,
        event: EventId,
        payload: &[u8],
    ) {
        let header = FrameHeader {
            kind: MessageKind::Notification,
            service,
            instance,
            method: event.as_method(),
            client: recipient,
            session: 0,
            length: payload.len() as u32,
        };
        let frame = encode_frame(&header, payload);
        self.deliver_frame(recipient, frame);
    }

    // ---- watchdog ------------------------------------------------------

    fn on_watchdog_cycle(&mut self) {
        for client in self.registry.mark_all_awaiting() {
            self.send_command(client, &Command::Ping);
        }
    }

    fn on_watchdog_check(&mut self) {
        let dead = self.registry.awaiting();
        if dead.is_empty() {
            return;
        }
        for client in &dead {
            warn!(error = %RoutingError::DeadClient(*client), "reaping client");
            self.cascade_removal(*client);
        }
        // One broadcast naming all reaped clients, to the survivors.
        self.broadcast(&Command::ApplicationLost { clients: dead });
    }

    fn on_pong(&mut self, client: ClientId) {
        if !self.registry.mark_alive(client) {
            // Reaped already; no resurrection without fresh registration.
            debug!(client = %client, "pong from unknown client ignored");
        }
    }

    // ---- catch-up ------------------------------------------------------

    /// Replay the current registry/service/subscription state to one
    /// client, so a late joiner gets a consistent snapshot without a
    /// transaction log.
    fn replay_state(&mut self, client: ClientId, include_registry: bool) {
        if include_registry {
            self.send_command(
                client,
                &Command::ApplicationInfo {
                    entries: self.registry.snapshot(),
                },
            );
        }
        let availability: Vec<_> = self
            .directory
            .providers()
            .filter_map(|((service, instance), provider)| {
                self.provider_location(provider)
                    .map(|location| (service, instance, location))
            })
            .collect();
        for (service, instance, location) in availability {
            self.send_command(
                client,
                &Command::ServiceAvailability {
                    service,
                    instance,
                    location,
                },
            );
        }
        for (service, instance, eventgroup, clients) in self.eventgroups.subscriptions() {
            self.send_command(
                client,
                &Command::SubscriptionInfo {
                    service,
                    instance,
                    eventgroup,
                    clients,
                },
            );
        }
    }

    // ---- delivery helpers ----------------------------------------------

    fn send_command(&mut self, client: ClientId, command: &Command) {
        if !self.registry.contains(client) {
            warn!(error = %RoutingError::UnknownClient(client), "dropping command");
            return;
        }
        self.out.push(Delivery::Local {
            client,
            bytes: encode_command(ClientId::DAEMON, command),
        });
    }

    fn broadcast(&mut self, command: &Command) {
        let wire = encode_command(ClientId::DAEMON, command);
        let clients: Vec<_> = self.registry.clients().collect();
        for client in clients {
            self.out.push(Delivery::Local {
                client,
                bytes: wire.clone(),
            });
        }
    }

    fn local_channel_name(&self, client: ClientId) -> String {
        format!("{}-{:04x}", self.channel_prefix, client.0)
    }
}
