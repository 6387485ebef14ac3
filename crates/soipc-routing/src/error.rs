//! Routing engine errors
//!
//! [`RoutingError`] covers the non-fatal conditions the dispatcher logs and
//! absorbs: the offending frame is dropped, or compensating cleanup runs,
//! and the daemon keeps serving. [`DaemonError`] covers the fatal startup
//! conditions surfaced to the caller of `init`/`start`; the daemon must
//! not continue in a half-started state.

use soipc_codec::CodecError;
use soipc_core::{ClientId, InstanceId, MethodId, ServiceId};
use soipc_transport::TransportError;
use thiserror::Error;

/// Non-fatal routing errors, logged and absorbed by the dispatcher
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// A live client id was registered a second time
    #[error("duplicate registration for client {0}")]
    DuplicateRegistration(ClientId),

    /// Command from or addressed to a client that is not registered
    #[error("unknown client {0}")]
    UnknownClient(ClientId),

    /// Service operation on a (service, instance) the caller does not own
    #[error("unknown service {0}/{1}")]
    UnknownService(ServiceId, InstanceId),

    /// Frame failed to decode (truncated or declared-length mismatch)
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] CodecError),

    /// No local or remote owner found for a routed method call
    #[error("routing miss for {service}/{instance}:{method}")]
    RoutingMiss {
        service: ServiceId,
        instance: InstanceId,
        method: MethodId,
    },

    /// Client failed the watchdog's grace window
    #[error("client {0} confirmed dead by watchdog")]
    DeadClient(ClientId),
}

/// Fatal daemon lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Local channel or network endpoint could not be established
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration could not be loaded or parsed
    #[error("config error: {0}")]
    Config(String),

    #[error("daemon already started")]
    AlreadyStarted,

    #[error("daemon not started")]
    NotStarted,
}
