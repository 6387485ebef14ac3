//! Codec error types

use thiserror::Error;

/// Errors produced while encoding or decoding frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before the fixed-size portion of the frame
    #[error("truncated frame: needed {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// Declared payload length does not match the delivered byte range
    #[error("length mismatch: declared {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Command opcode outside the known set
    #[error("unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),

    /// Routed frame kind outside the known set
    #[error("unknown message kind: 0x{0:02x}")]
    UnknownKind(u8),

    /// String payload is not valid UTF-8 or not parseable
    #[error("bad string payload: {0}")]
    BadString(String),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
