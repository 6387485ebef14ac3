//! Command frames exchanged over the local channel
//!
//! Commands are the control protocol between applications and the daemon:
//! registration, service management, subscriptions, liveness, and the
//! forwarding envelope for routed frames. Every command frame carries the
//! sender's client id in its header; daemon-originated commands use
//! [`ClientId::DAEMON`](soipc_core::ClientId::DAEMON).

use bytes::Bytes;
use soipc_core::{
    ClientId, EventId, EventgroupId, InstanceId, Location, MethodId, ServiceId,
};

/// Command opcodes
pub mod opcode {
    // client -> daemon
    pub const REGISTER_APPLICATION: u8 = 0x01;
    pub const DEREGISTER_APPLICATION: u8 = 0x02;
    pub const PONG: u8 = 0x03;
    pub const PROVIDE_SERVICE: u8 = 0x10;
    pub const WITHDRAW_SERVICE: u8 = 0x11;
    pub const REQUEST_SERVICE: u8 = 0x12;
    pub const RELEASE_SERVICE: u8 = 0x13;
    pub const REGISTER_METHOD: u8 = 0x14;
    pub const DEREGISTER_METHOD: u8 = 0x15;
    pub const SUBSCRIBE_EVENTGROUP: u8 = 0x20;
    pub const UNSUBSCRIBE_EVENTGROUP: u8 = 0x21;
    pub const PUBLISH_FIELD: u8 = 0x22;
    pub const FORWARD_MESSAGE: u8 = 0x30;

    // daemon -> client
    pub const PING: u8 = 0x04;
    pub const APPLICATION_INFO: u8 = 0x40;
    pub const APPLICATION_LOST: u8 = 0x41;
    pub const SERVICE_AVAILABILITY: u8 = 0x42;
    pub const SUBSCRIPTION_INFO: u8 = 0x43;
}

/// One registry entry in an [`Command::ApplicationInfo`] snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEntry {
    pub client: ClientId,
    pub managing: bool,
    pub name: String,
}

/// A decoded command frame body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // client -> daemon
    RegisterApplication {
        name: String,
        managing: bool,
    },
    DeregisterApplication,
    Pong,
    ProvideService {
        service: ServiceId,
        instance: InstanceId,
    },
    WithdrawService {
        service: ServiceId,
        instance: InstanceId,
    },
    RequestService {
        service: ServiceId,
        instance: InstanceId,
    },
    ReleaseService {
        service: ServiceId,
        instance: InstanceId,
    },
    RegisterMethod {
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    },
    DeregisterMethod {
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    },
    SubscribeEventgroup {
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
    },
    UnsubscribeEventgroup {
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
    },
    PublishField {
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        event: EventId,
        payload: Bytes,
    },
    /// Envelope for a routed message frame; also used daemon -> client to
    /// deliver a routed frame
    ForwardMessage {
        frame: Bytes,
    },

    // daemon -> client
    Ping,
    ApplicationInfo {
        entries: Vec<ApplicationEntry>,
    },
    ApplicationLost {
        clients: Vec<ClientId>,
    },
    ServiceAvailability {
        service: ServiceId,
        instance: InstanceId,
        location: Location,
    },
    SubscriptionInfo {
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        clients: Vec<ClientId>,
    },
}

impl Command {
    /// The wire opcode of this command
    pub fn opcode(&self) -> u8 {
        match self {
            Command::RegisterApplication { .. } => opcode::REGISTER_APPLICATION,
            Command::DeregisterApplication => opcode::DEREGISTER_APPLICATION,
            Command::Pong => opcode::PONG,
            Command::ProvideService { .. } => opcode::PROVIDE_SERVICE,
            Command::WithdrawService { .. } => opcode::WITHDRAW_SERVICE,
            Command::RequestService { .. } => opcode::REQUEST_SERVICE,
            Command::ReleaseService { .. } => opcode::RELEASE_SERVICE,
            Command::RegisterMethod { .. } => opcode::REGISTER_METHOD,
            Command::DeregisterMethod { .. } => opcode::DEREGISTER_METHOD,
            Command::SubscribeEventgroup { .. } => opcode::SUBSCRIBE_EVENTGROUP,
            Command::UnsubscribeEventgroup { .. } => opcode::UNSUBSCRIBE_EVENTGROUP,
            Command::PublishField { .. } => opcode::PUBLISH_FIELD,
            Command::ForwardMessage { .. } => opcode::FORWARD_MESSAGE,
            Command::Ping => opcode::PING,
            Command::ApplicationInfo { .. } => opcode::APPLICATION_INFO,
            Command::ApplicationLost { .. } => opcode::APPLICATION_LOST,
            Command::ServiceAvailability { .. } => opcode::SERVICE_AVAILABILITY,
            Command::SubscriptionInfo { .. } => opcode::SUBSCRIPTION_INFO,
        }
    }
}
