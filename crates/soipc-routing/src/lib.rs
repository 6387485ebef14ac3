//! soipc-routing - The routing and state-management engine of soipcd
//!
//! Local applications register as service providers or consumers over the
//! daemon's local channel; this crate routes requests, responses, and
//! published events between them, locally or via a remote network endpoint.
//!
//! The engine is a set of interlinked tables (client registry, service
//! directory, channel router, endpoint registry, eventgroup/field manager)
//! owned exclusively by a single control task. The receiver and network
//! contexts hand completed reads to that task over a channel; it performs
//! every table mutation and emits delivery jobs to the sender and network
//! queues. No routing table is ever touched from two tasks.

pub mod channels;
pub mod config;
pub mod daemon;
pub mod directory;
pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod eventgroups;
pub mod registry;
pub mod watchdog;

pub use config::{DaemonConfig, DaemonSection, WatchdogConfig};
pub use daemon::{Daemon, DaemonHandle};
pub use dispatch::{ControlInput, Delivery, RoutingCore};
pub use error::{DaemonError, RoutingError};
