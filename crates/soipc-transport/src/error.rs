//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    Bind(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("channel closed")]
    Closed,

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("transport not supported: {0}")]
    Unsupported(String),
}
