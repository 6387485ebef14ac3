//! Routed message frame header
//!
//! A routed frame is an RPC or event message the daemon forwards between
//! applications without interpreting its payload. The 16-byte header carries
//! everything the router needs: addressing, the return-path client id, and
//! the declared payload length.

use soipc_core::{ClientId, InstanceId, MethodId, ServiceId};

use crate::error::{CodecError, CodecResult};

/// Size of the fixed routed-frame header in bytes
pub const FRAME_HEADER_LEN: usize = 16;

/// Kind of a routed message frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Method call expecting a response
    Request = 0x00,
    /// Fire-and-forget method call
    RequestNoReturn = 0x01,
    /// Event/field notification
    Notification = 0x02,
    /// Response to a request
    Response = 0x80,
    /// Error response to a request
    Error = 0x81,
}

impl MessageKind {
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0x00 => Ok(Self::Request),
            0x01 => Ok(Self::RequestNoReturn),
            0x02 => Ok(Self::Notification),
            0x80 => Ok(Self::Response),
            0x81 => Ok(Self::Error),
            other => Err(CodecError::UnknownKind(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Routing direction derived from the frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Requests route forward to the method's registered owner
    Forward,
    /// Responses, errors, and notifications route back to the client id
    /// carried in the header
    Return,
}

/// The fixed header of a routed message frame
///
/// Layout (big-endian):
/// `kind u8 | reserved u8 | service u16 | instance u16 | method u16 |
/// client u16 | session u16 | length u32`.
///
/// `client` is the sender on requests and the return-path destination on
/// responses and notifications. `session` correlates request/response pairs
/// for the applications; the daemon carries it opaquely. In notifications
/// `method` holds the event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: MessageKind,
    pub service: ServiceId,
    pub instance: InstanceId,
    pub method: MethodId,
    pub client: ClientId,
    pub session: u16,
    pub length: u32,
}

impl FrameHeader {
    /// Pick the routing direction for this frame. Pure header inspection.
    pub fn classify(&self) -> Route {
        match self.kind {
            MessageKind::Request | MessageKind::RequestNoReturn => Route::Forward,
            MessageKind::Notification | MessageKind::Response | MessageKind::Error => {
                Route::Return
            }
        }
    }

    /// Whether this frame expects a response to route back
    pub fn is_request(&self) -> bool {
        matches!(self.classify(), Route::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_route_forward() {
        for kind in [MessageKind::Request, MessageKind::RequestNoReturn] {
            let header = FrameHeader {
                kind,
                service: ServiceId(0x0100),
                instance: InstanceId(1),
                method: MethodId(0x21),
                client: ClientId(5),
                session: 1,
                length: 0,
            };
            assert_eq!(header.classify(), Route::Forward);
            assert!(header.is_request());
        }
    }

    #[test]
    fn responses_and_notifications_route_back() {
        for kind in [
            MessageKind::Response,
            MessageKind::Error,
            MessageKind::Notification,
        ] {
            let header = FrameHeader {
                kind,
                service: ServiceId(0x0100),
                instance: InstanceId(1),
                method: MethodId(0x21),
                client: ClientId(5),
                session: 1,
                length: 0,
            };
            assert_eq!(header.classify(), Route::Return);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(MessageKind::from_u8(0x7f), Err(CodecError::UnknownKind(0x7f)));
        assert_eq!(MessageKind::from_u8(0x80), Ok(MessageKind::Response));
    }
}
