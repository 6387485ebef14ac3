//! Decoding bytes to commands and routed frames
//!
//! Both decoders enforce the declared-length contract: the `length` field
//! must match the delivered byte range exactly, otherwise the frame is
//! rejected with [`CodecError::LengthMismatch`].

use bytes::Bytes;
use soipc_core::{
    ClientId, EventId, EventgroupId, InstanceId, Location, MethodId, ServiceId,
};

use crate::command::{opcode, ApplicationEntry, Command};
use crate::encode::{opcode_loc, COMMAND_HEADER_LEN};
use crate::error::{CodecError, CodecResult};
use crate::frame::{FrameHeader, MessageKind, FRAME_HEADER_LEN};

/// Decode a command frame, returning the sender id and the command
pub fn decode_command(data: &[u8]) -> CodecResult<(ClientId, Command)> {
    let mut reader = Reader::new(data);
    let op = reader.take_u8()?;
    let _flags = reader.take_u8()?;
    let sender = ClientId(reader.take_u16()?);
    let declared = reader.take_u32()? as usize;
    let actual = data.len() - COMMAND_HEADER_LEN;
    if declared != actual {
        return Err(CodecError::LengthMismatch { declared, actual });
    }

    let command = match op {
        opcode::REGISTER_APPLICATION => {
            let managing = reader.take_u8()? != 0;
            let len = reader.remaining();
            let name = take_utf8(&mut reader, len)?;
            Command::RegisterApplication { name, managing }
        }
        opcode::DEREGISTER_APPLICATION => Command::DeregisterApplication,
        opcode::PONG => Command::Pong,
        opcode::PING => Command::Ping,
        opcode::PROVIDE_SERVICE => {
            let (service, instance) = take_service_instance(&mut reader)?;
            Command::ProvideService { service, instance }
        }
        opcode::WITHDRAW_SERVICE => {
            let (service, instance) = take_service_instance(&mut reader)?;
            Command::WithdrawService { service, instance }
        }
        opcode::REQUEST_SERVICE => {
            let (service, instance) = take_service_instance(&mut reader)?;
            Command::RequestService { service, instance }
        }
        opcode::RELEASE_SERVICE => {
            let (service, instance) = take_service_instance(&mut reader)?;
            Command::ReleaseService { service, instance }
        }
        opcode::REGISTER_METHOD => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let method = MethodId(reader.take_u16()?);
            Command::RegisterMethod {
                service,
                instance,
                method,
            }
        }
        opcode::DEREGISTER_METHOD => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let method = MethodId(reader.take_u16()?);
            Command::DeregisterMethod {
                service,
                instance,
                method,
            }
        }
        opcode::SUBSCRIBE_EVENTGROUP => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let eventgroup = EventgroupId(reader.take_u16()?);
            Command::SubscribeEventgroup {
                service,
                instance,
                eventgroup,
            }
        }
        opcode::UNSUBSCRIBE_EVENTGROUP => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let eventgroup = EventgroupId(reader.take_u16()?);
            Command::UnsubscribeEventgroup {
                service,
                instance,
                eventgroup,
            }
        }
        opcode::PUBLISH_FIELD => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let eventgroup = EventgroupId(reader.take_u16()?);
            let event = EventId(reader.take_u16()?);
            let payload = Bytes::copy_from_slice(reader.take_rest());
            Command::PublishField {
                service,
                instance,
                eventgroup,
                event,
                payload,
            }
        }
        opcode::FORWARD_MESSAGE => {
            let frame = Bytes::copy_from_slice(reader.take_rest());
            Command::ForwardMessage { frame }
        }
        opcode::APPLICATION_INFO => {
            let count = reader.take_u16()? as usize;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let client = ClientId(reader.take_u16()?);
                let managing = reader.take_u8()? != 0;
                let name_len = reader.take_u16()? as usize;
                let name = take_utf8(&mut reader, name_len)?;
                entries.push(ApplicationEntry {
                    client,
                    managing,
                    name,
                });
            }
            Command::ApplicationInfo { entries }
        }
        opcode::APPLICATION_LOST => {
            let clients = take_clients(&mut reader)?;
            Command::ApplicationLost { clients }
        }
        opcode::SERVICE_AVAILABILITY => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let _available = reader.take_u8()?;
            let location = take_location(&mut reader)?;
            Command::ServiceAvailability {
                service,
                instance,
                location,
            }
        }
        opcode::SUBSCRIPTION_INFO => {
            let (service, instance) = take_service_instance(&mut reader)?;
            let eventgroup = EventgroupId(reader.take_u16()?);
            let clients = take_clients(&mut reader)?;
            Command::SubscriptionInfo {
                service,
                instance,
                eventgroup,
                clients,
            }
        }
        other => return Err(CodecError::UnknownOpcode(other)),
    };

    // Fixed-layout bodies must be consumed exactly; trailing bytes are a
    // malformed frame, not padding.
    if reader.remaining() != 0 {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: declared - reader.remaining(),
        });
    }

    Ok((sender, command))
}

/// Decode a routed message frame, validating the declared payload length
pub fn decode_frame(data: &[u8]) -> CodecResult<(FrameHeader, Bytes)> {
    let mut reader = Reader::new(data);
    let kind = MessageKind::from_u8(reader.take_u8()?)?;
    let _reserved = reader.take_u8()?;
    let header = FrameHeader {
        kind,
        service: ServiceId(reader.take_u16()?),
        instance: InstanceId(reader.take_u16()?),
        method: MethodId(reader.take_u16()?),
        client: ClientId(reader.take_u16()?),
        session: reader.take_u16()?,
        length: reader.take_u32()?,
    };

    let declared = header.length as usize;
    let actual = data.len() - FRAME_HEADER_LEN;
    if declared != actual {
        return Err(CodecError::LengthMismatch { declared, actual });
    }

    Ok((header, Bytes::copy_from_slice(reader.take_rest())))
}

fn take_service_instance(reader: &mut Reader<'_>) -> CodecResult<(ServiceId, InstanceId)> {
    Ok((ServiceId(reader.take_u16()?), InstanceId(reader.take_u16()?)))
}

fn take_clients(reader: &mut Reader<'_>) -> CodecResult<Vec<ClientId>> {
    let count = reader.take_u16()? as usize;
    let mut clients = Vec::with_capacity(count);
    for _ in 0..count {
        clients.push(ClientId(reader.take_u16()?));
    }
    Ok(clients)
}

fn take_utf8(reader: &mut Reader<'_>, len: usize) -> CodecResult<String> {
    let raw = reader.take_bytes(len)?;
    String::from_utf8(raw.to_vec()).map_err(|e| CodecError::BadString(e.to_string()))
}

fn take_location(reader: &mut Reader<'_>) -> CodecResult<Location> {
    match reader.take_u8()? {
        opcode_loc::NONE => Ok(Location::None),
        opcode_loc::LOCAL => {
            let len = reader.take_u16()? as usize;
            let channel = take_utf8(reader, len)?;
            Ok(Location::Local { channel })
        }
        opcode_loc::REMOTE => {
            let reliable = reader.take_u8()? != 0;
            let len = reader.take_u16()? as usize;
            let rendered = take_utf8(reader, len)?;
            let addr = rendered
                .parse()
                .map_err(|_| CodecError::BadString(rendered))?;
            Ok(Location::Remote { addr, reliable })
        }
        other => Err(CodecError::BadString(format!("location tag {other}"))),
    }
}

/// Bounds-checked big-endian reader over a byte slice
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CodecError::Truncated {
                needed: self.pos + len,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    fn take_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take_bytes(1)?[0])
    }

    fn take_u16(&mut self) -> CodecResult<u16> {
        let b = self.take_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> CodecResult<u32> {
        let b = self.take_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_command, encode_frame};
    use pretty_assertions::assert_eq;

    #[test]
    fn register_application_round_trip() {
        let cmd = Command::RegisterApplication {
            name: "nav".to_string(),
            managing: true,
        };
        let wire = encode_command(ClientId(5), &cmd);
        let (sender, decoded) = decode_command(&wire).unwrap();
        assert_eq!(sender, ClientId(5));
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn service_availability_round_trip() {
        for location in [
            Location::None,
            Location::Local {
                channel: "/tmp/soipc-0005".to_string(),
            },
            Location::Remote {
                addr: "10.0.0.1:30490".parse().unwrap(),
                reliable: true,
            },
        ] {
            let cmd = Command::ServiceAvailability {
                service: ServiceId(100),
                instance: InstanceId(1),
                location: location.clone(),
            };
            let wire = encode_command(ClientId::DAEMON, &cmd);
            let (_, decoded) = decode_command(&wire).unwrap();
            assert_eq!(decoded, cmd);
        }
    }

    #[test]
    fn application_info_round_trip() {
        let cmd = Command::ApplicationInfo {
            entries: vec![
                ApplicationEntry {
                    client: ClientId(5),
                    managing: false,
                    name: "nav".to_string(),
                },
                ApplicationEntry {
                    client: ClientId(6),
                    managing: true,
                    name: "diag".to_string(),
                },
            ],
        };
        let wire = encode_command(ClientId::DAEMON, &cmd);
        let (_, decoded) = decode_command(&wire).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn publish_field_round_trip() {
        let cmd = Command::PublishField {
            service: ServiceId(100),
            instance: InstanceId(1),
            eventgroup: EventgroupId(7),
            event: EventId(0x8001),
            payload: Bytes::from_static(b"\x01\x02\x03"),
        };
        let wire = encode_command(ClientId(5), &cmd);
        let (_, decoded) = decode_command(&wire).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = decode_command(&[opcode::PONG, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut wire = encode_command(ClientId(5), &Command::Pong).to_vec();
        wire.push(0xaa); // one trailing byte beyond the declared length
        let err = decode_command(&wire).unwrap_err();
        assert_eq!(
            err,
            CodecError::LengthMismatch {
                declared: 0,
                actual: 1
            }
        );
    }

    #[test]
    fn trailing_body_bytes_are_rejected() {
        let mut wire = encode_command(
            ClientId(5),
            &Command::RegisterMethod {
                service: ServiceId(100),
                instance: InstanceId(1),
                method: MethodId(0x21),
            },
        )
        .to_vec();
        // Pad the body and fix up the declared length so the outer
        // contract still holds.
        wire.extend_from_slice(&[0u8; 4]);
        wire[4..8].copy_from_slice(&10u32.to_be_bytes());

        let err = decode_command(&wire).unwrap_err();
        assert_eq!(
            err,
            CodecError::LengthMismatch {
                declared: 10,
                actual: 6
            }
        );
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let wire = [0xee, 0, 0, 5, 0, 0, 0, 0];
        assert_eq!(decode_command(&wire).unwrap_err(), CodecError::UnknownOpcode(0xee));
    }

    #[test]
    fn routed_frame_round_trip() {
        let header = FrameHeader {
            kind: MessageKind::Request,
            service: ServiceId(100),
            instance: InstanceId(1),
            method: MethodId(0x21),
            client: ClientId(6),
            session: 42,
            length: 4,
        };
        let wire = encode_frame(&header, b"ping");
        let (decoded, payload) = decode_frame(&wire).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload.as_ref(), b"ping");
    }

    #[test]
    fn routed_frame_length_mismatch_is_rejected() {
        let header = FrameHeader {
            kind: MessageKind::Response,
            service: ServiceId(100),
            instance: InstanceId(1),
            method: MethodId(0x21),
            client: ClientId(6),
            session: 42,
            length: 4,
        };
        let wire = encode_frame(&header, b"ping");
        let err = decode_frame(&wire[..wire.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            CodecError::LengthMismatch {
                declared: 4,
                actual: 3
            }
        );
    }
}
