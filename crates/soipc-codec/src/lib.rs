//! soipc-codec - Wire codec for the soipc routing daemon
//!
//! The daemon consumes this crate as its serializer/deserializer pair; the
//! byte layout lives here and nowhere else. Two frame families exist:
//!
//! - **Command frames** travel over the local channel between applications
//!   and the daemon (registration, service management, subscriptions,
//!   liveness). Layout: `opcode u8 | flags u8 | client u16 | length u32 |
//!   body`, big-endian.
//! - **Routed message frames** are the RPC/event frames the daemon forwards
//!   between applications. Layout: a fixed 16-byte header followed by
//!   `length` payload bytes; see [`frame::FrameHeader`].
//!
//! Both decoders enforce the declared-length contract: a frame whose
//! declared length does not match the delivered byte range is a decode
//! error, never a partial success.
//!
//! # Quick start
//!
//! ```rust
//! use soipc_codec::{decode_command, encode_command, Command};
//! use soipc_core::{ClientId, InstanceId, ServiceId};
//!
//! let cmd = Command::RequestService {
//!     service: ServiceId(0x0064),
//!     instance: InstanceId(0x0001),
//! };
//! let wire = encode_command(ClientId(5), &cmd);
//! let (sender, decoded) = decode_command(&wire).unwrap();
//! assert_eq!(sender, ClientId(5));
//! assert_eq!(decoded, cmd);
//! ```

pub mod command;
pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;

pub use command::{opcode, ApplicationEntry, Command};
pub use decode::{decode_command, decode_frame};
pub use encode::{encode_command, encode_frame, COMMAND_HEADER_LEN};
pub use error::{CodecError, CodecResult};
pub use frame::{FrameHeader, MessageKind, Route, FRAME_HEADER_LEN};
