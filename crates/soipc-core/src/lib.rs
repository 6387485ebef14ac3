//! soipc-core - Shared types for the soipc routing daemon
//!
//! This crate provides the identifier handles and location types used by
//! every other member of the workspace: the codec, the transports, and the
//! routing engine itself.

pub mod ids;
pub mod location;

pub use ids::{ClientId, EventId, EventgroupId, InstanceId, MethodId, ServiceId};
pub use location::Location;
