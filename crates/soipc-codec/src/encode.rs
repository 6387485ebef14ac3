//! Encoding commands and routed frames to bytes
//!
//! All multi-byte fields are big-endian. The command frame header is
//! `opcode u8 | flags u8 (reserved) | client u16 | length u32`, where
//! `length` counts body bytes only.

use bytes::{BufMut, Bytes, BytesMut};
use soipc_core::{ClientId, Location};

use crate::command::{opcode, Command};
use crate::frame::{FrameHeader, FRAME_HEADER_LEN};

/// Size of the fixed command frame header in bytes
pub const COMMAND_HEADER_LEN: usize = 8;

/// Encode a command frame with the given sender id
pub fn encode_command(sender: ClientId, command: &Command) -> Bytes {
    let body = encode_body(command);
    let mut buf = BytesMut::with_capacity(COMMAND_HEADER_LEN + body.len());
    buf.put_u8(command.opcode());
    buf.put_u8(0); // flags, reserved
    buf.put_u16(sender.0);
    buf.put_u32(body.len() as u32);
    buf.put_slice(&body);
    buf.freeze()
}

/// Encode a routed message frame (header + payload)
pub fn encode_frame(header: &FrameHeader, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u8(header.kind.as_u8());
    buf.put_u8(0); // reserved
    buf.put_u16(header.service.0);
    buf.put_u16(header.instance.0);
    buf.put_u16(header.method.0);
    buf.put_u16(header.client.0);
    buf.put_u16(header.session);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

fn encode_body(command: &Command) -> BytesMut {
    let mut buf = BytesMut::new();
    match command {
        Command::RegisterApplication { name, managing } => {
            buf.put_u8(u8::from(*managing));
            buf.put_slice(name.as_bytes());
        }
        Command::DeregisterApplication | Command::Pong | Command::Ping => {}
        Command::ProvideService { service, instance }
        | Command::WithdrawService { service, instance }
        | Command::RequestService { service, instance }
        | Command::ReleaseService { service, instance } => {
            buf.put_u16(service.0);
            buf.put_u16(instance.0);
        }
        Command::RegisterMethod {
            service,
            instance,
            method,
        }
        | Command::DeregisterMethod {
            service,
            instance,
            method,
        } => {
            buf.put_u16(service.0);
            buf.put_u16(instance.0);
            buf.put_u16(method.0);
        }
        Command::SubscribeEventgroup {
            service,
            instance,
            eventgroup,
        }
        | Command::UnsubscribeEventgroup {
            service,
            instance,
            eventgroup,
        } => {
            buf.put_u16(service.0);
            buf.put_u16(instance.0);
            buf.put_u16(eventgroup.0);
        }
        Command::PublishField {
            service,
            instance,
            eventgroup,
            event,
            payload,
        } => {
            buf.put_u16(service.0);
            buf.put_u16(instance.0);
            buf.put_u16(eventgroup.0);
            buf.put_u16(event.0);
            buf.put_slice(payload);
        }
        Command::ForwardMessage { frame } => {
            buf.put_slice(frame);
        }
        Command::ApplicationInfo { entries } => {
            buf.put_u16(entries.len() as u16);
            for entry in entries {
                buf.put_u16(entry.client.0);
                buf.put_u8(u8::from(entry.managing));
                buf.put_u16(entry.name.len() as u16);
                buf.put_slice(entry.name.as_bytes());
            }
        }
        Command::ApplicationLost { clients } => {
            buf.put_u16(clients.len() as u16);
            for client in clients {
                buf.put_u16(client.0);
            }
        }
        Command::ServiceAvailability {
            service,
            instance,
            location,
        } => {
            buf.put_u16(service.0);
            buf.put_u16(instance.0);
            buf.put_u8(u8::from(!location.is_none()));
            encode_location(&mut buf, location);
        }
        Command::SubscriptionInfo {
            service,
            instance,
            eventgroup,
            clients,
        } => {
            buf.put_u16(service.0);
            buf.put_u16(instance.0);
            buf.put_u16(eventgroup.0);
            buf.put_u16(clients.len() as u16);
            for client in clients {
                buf.put_u16(client.0);
            }
        }
    }
    buf
}

fn encode_location(buf: &mut BytesMut, location: &Location) {
    match location {
        Location::None => buf.put_u8(opcode_loc::NONE),
        Location::Local { channel } => {
            buf.put_u8(opcode_loc::LOCAL);
            buf.put_u16(channel.len() as u16);
            buf.put_slice(channel.as_bytes());
        }
        Location::Remote { addr, reliable } => {
            buf.put_u8(opcode_loc::REMOTE);
            buf.put_u8(u8::from(*reliable));
            let rendered = addr.to_string();
            buf.put_u16(rendered.len() as u16);
            buf.put_slice(rendered.as_bytes());
        }
    }
}

/// Location tags used inside `ServiceAvailability`
pub(crate) mod opcode_loc {
    pub const NONE: u8 = 0;
    pub const LOCAL: u8 = 1;
    pub const REMOTE: u8 = 2;
}
