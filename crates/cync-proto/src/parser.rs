//! Inbound frame parsers.
//!
//! The parser works on one complete outer frame at a time (the session's
//! [`crate::frame::FrameAssembler`] handles stream splitting) and resolves
//! mesh references against a flat endpoint view supplied by the topology
//! layer. Frames it cannot interpret fail with
//! [`ProtoError::NotImplemented`]; the session loop skips those.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::capability::is_mesh_device;
use crate::error::{ProtoError, ProtoResult};
use crate::frame::{FrameHeader, HEADER_LEN};
use crate::pipe;
use crate::wire::{MessageType, PipeCommand};

/// Minimal device view the parser needs to resolve mesh references.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshEndpoint {
    pub device_id: u32,
    pub mesh_ref: u8,
    pub device_type: u16,
}

/// A per-device state report carried by a sync push or a status page.
/// Sync pushes do not include reachability, hence the optional field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub is_online: Option<bool>,
    pub is_on: bool,
    pub brightness: u8,
    pub color_mode: u8,
    pub rgb: (u8, u8, u8),
}

/// A fully-decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    LoginAck {
        version: u8,
        is_response: bool,
    },
    ProbeAck {
        device_id: u32,
        version: u8,
        is_response: bool,
        data: Vec<u8>,
    },
    Sync {
        device_id: u32,
        updates: HashMap<u32, DeviceStatus>,
    },
    Pipe {
        device_id: u32,
        command: PipeCommand,
        updates: HashMap<u32, DeviceStatus>,
    },
    Disconnect,
}

fn device_id_at(payload: &[u8]) -> ProtoResult<u32> {
    let bytes = payload.get(0..4).ok_or(ProtoError::LengthMismatch {
        expected: 4,
        actual: payload.len(),
    })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn resolve_mesh_ref(endpoints: &[MeshEndpoint], mesh_ref: u16) -> Option<u32> {
    endpoints
        .iter()
        .find(|ep| u16::from(ep.mesh_ref) == mesh_ref)
        .map(|ep| ep.device_id)
}

/// Parses one complete outer frame into a typed message.
pub fn parse_frame(frame: &[u8], endpoints: &[MeshEndpoint]) -> ProtoResult<InboundMessage> {
    let header = FrameHeader::decode(frame)?;
    let payload = &frame[HEADER_LEN..];
    if payload.len() != header.payload_len {
        return Err(ProtoError::LengthMismatch {
            expected: header.payload_len,
            actual: payload.len(),
        });
    }

    match header.msg_type {
        MessageType::Login => Ok(InboundMessage::LoginAck {
            version: header.version,
            is_response: header.is_response,
        }),
        MessageType::Probe => parse_probe(payload, &header),
        MessageType::Sync => parse_sync(payload, &header, endpoints),
        MessageType::Pipe => parse_pipe(payload, &header, endpoints),
        MessageType::Disconnect => Ok(InboundMessage::Disconnect),
        MessageType::Handshake | MessageType::PipeSync | MessageType::Ping => {
            Err(ProtoError::NotImplemented("uninterpreted outer message type"))
        }
    }
}

fn parse_probe(payload: &[u8], header: &FrameHeader) -> ProtoResult<InboundMessage> {
    let device_id = device_id_at(payload)?;
    Ok(InboundMessage::ProbeAck {
        device_id,
        version: header.version,
        is_response: header.is_response,
        data: payload[4..].to_vec(),
    })
}

/// Unsolicited state push. Only the `01 01 06` light-state shape from a mesh
/// device is understood; everything else (thermostat sensor blobs, other
/// prefixes) is left to the skip path.
fn parse_sync(
    payload: &[u8],
    _header: &FrameHeader,
    endpoints: &[MeshEndpoint],
) -> ProtoResult<InboundMessage> {
    let device_id = device_id_at(payload)?;
    let endpoint = endpoints
        .iter()
        .find(|ep| ep.device_id == device_id)
        .ok_or(ProtoError::DeviceNotFound(device_id))?;

    if payload.get(4..7) != Some(&[0x01, 0x01, 0x06][..]) || !is_mesh_device(endpoint.device_type) {
        return Err(ProtoError::NotImplemented("unrecognized sync payload shape"));
    }

    let mut updates = HashMap::new();
    let mut rest = &payload[7..];
    // Entries: tag, big-endian info length, then the entry body.
    while rest.len() > 3 {
        let info_len = usize::from(u16::from_be_bytes([rest[1], rest[2]]));
        let Some(entry) = rest.get(3..3 + info_len) else {
            log::debug!("truncated sync entry ({} of {info_len} bytes)", rest.len() - 3);
            break;
        };
        if entry.len() >= 7 {
            let mesh_ref = u16::from(entry[0]);
            if let Some(resolved) = resolve_mesh_ref(endpoints, mesh_ref) {
                updates.insert(
                    resolved,
                    DeviceStatus {
                        is_online: None,
                        is_on: entry[1] != 0,
                        brightness: entry[2],
                        color_mode: entry[3],
                        rgb: (entry[4], entry[5], entry[6]),
                    },
                );
            } else {
                log::debug!("sync update for unknown mesh ref {mesh_ref}");
            }
        }
        rest = &rest[3 + info_len..];
    }

    Ok(InboundMessage::Sync { device_id, updates })
}

fn parse_pipe(
    payload: &[u8],
    header: &FrameHeader,
    endpoints: &[MeshEndpoint],
) -> ProtoResult<InboundMessage> {
    let device_id = device_id_at(payload)?;
    if header.payload_len <= 7 || payload[7] != pipe::DELIMITER {
        return Err(ProtoError::NotImplemented("pipe payload without inner frame"));
    }

    let inner = pipe::decode(&payload[7..])?;
    match PipeCommand::from_wire(inner.command) {
        Some(command @ PipeCommand::QueryDeviceStatusPages) => Ok(InboundMessage::Pipe {
            device_id,
            command,
            updates: parse_status_pages(&inner.args, endpoints),
        }),
        _ => Err(ProtoError::NotImplemented("uninterpreted pipe command")),
    }
}

/// Repeating 24-byte device records after a 6-byte preamble whose bytes 4..6
/// carry the record count.
fn parse_status_pages(args: &[u8], endpoints: &[MeshEndpoint]) -> HashMap<u32, DeviceStatus> {
    let mut updates = HashMap::new();
    let Some(count_bytes) = args.get(4..6) else {
        return updates;
    };
    let count = usize::from(u16::from_le_bytes([count_bytes[0], count_bytes[1]]));

    for record in args[6..].chunks_exact(24).take(count) {
        let mesh_ref = u16::from_le_bytes([record[0], record[1]]);
        let Some(device_id) = resolve_mesh_ref(endpoints, mesh_ref) else {
            log::debug!("status record for unknown mesh ref {mesh_ref}");
            continue;
        };
        updates.insert(
            device_id,
            DeviceStatus {
                is_online: Some(record[3] != 0),
                is_on: record[8] != 0,
                brightness: record[12],
                color_mode: record[16],
                rgb: (record[20], record[21], record[22]),
            },
        );
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_HOME_ID: u32 = 5432;

    fn endpoint(device_id: u32, mesh_device_id: u32, device_type: u16) -> MeshEndpoint {
        MeshEndpoint {
            device_id,
            mesh_ref: (mesh_device_id % TEST_HOME_ID) as u8,
            device_type,
        }
    }

    fn mesh_endpoints() -> Vec<MeshEndpoint> {
        vec![
            endpoint(1234, 4, 137),
            endpoint(2345, 7, 137),
            endpoint(3456, 2, 137),
            endpoint(4567, 232, 137),
            endpoint(5678, 30, 137),
        ]
    }

    #[test]
    fn login_ack() {
        let frame = hex::decode("18000000020000").unwrap();
        let parsed = parse_frame(&frame, &[]).unwrap();
        assert_eq!(
            parsed,
            InboundMessage::LoginAck {
                version: 0,
                is_response: true,
            }
        );
    }

    #[test]
    fn probe_ack_carries_opaque_data() {
        let blob = "73656e736f7273446174613a5b7b2254797065223a224e6f6e65222c2254656d7065726174757265223a6e756c6c2c2248756d6964697479223a6e756c6c2c22416374697665223a66616c73652c2242617474223a6e756c6c7d5d";
        let frame = hex::decode(format!("ab0000005f499602d2{blob}")).unwrap();
        let parsed = parse_frame(&frame, &[]).unwrap();

        let InboundMessage::ProbeAck {
            device_id,
            version,
            is_response,
            data,
        } = parsed
        else {
            panic!("expected probe ack, got {parsed:?}");
        };
        assert_eq!(device_id, 1_234_567_890);
        assert_eq!(version, 3);
        assert!(is_response);
        assert_eq!(data, hex::decode(blob).unwrap());
    }

    #[test]
    fn pipe_status_pages() {
        let frame = hex::decode(concat!(
            "730000009100000d8002e5007e01010000f9527d5e0005000000050004008901",
            "00008901010000005000000039000000d796ff000700000100000001000000000",
            "0000000fe000000f8383000020000010000000101000000410000001e00000000",
            "000000e800000100000001010000005000000039000000000000001e000001000",
            "0000101000000500000003900000000000000d17e"
        ))
        .unwrap();
        let endpoints = mesh_endpoints();
        let parsed = parse_frame(&frame, &endpoints).unwrap();

        let InboundMessage::Pipe {
            device_id,
            command,
            updates,
        } = parsed
        else {
            panic!("expected pipe message, got {parsed:?}");
        };
        assert_eq!(device_id, 3456);
        assert_eq!(command, PipeCommand::QueryDeviceStatusPages);
        assert_eq!(updates.len(), 5);
        assert_eq!(
            updates[&1234],
            DeviceStatus {
                is_online: Some(true),
                is_on: true,
                brightness: 80,
                color_mode: 57,
                rgb: (215, 150, 255),
            }
        );
        assert_eq!(
            updates[&2345],
            DeviceStatus {
                is_online: Some(true),
                is_on: false,
                brightness: 0,
                color_mode: 254,
                rgb: (248, 56, 48),
            }
        );
        assert_eq!(
            updates[&3456],
            DeviceStatus {
                is_online: Some(true),
                is_on: true,
                brightness: 65,
                color_mode: 30,
                rgb: (0, 0, 0),
            }
        );
        assert_eq!(
            updates[&4567],
            DeviceStatus {
                is_online: Some(true),
                is_on: true,
                brightness: 80,
                color_mode: 57,
                rgb: (0, 0, 0),
            }
        );
        assert_eq!(
            updates[&5678],
            DeviceStatus {
                is_online: Some(true),
                is_on: true,
                brightness: 80,
                color_mode: 57,
                rgb: (0, 0, 0),
            }
        );
    }

    #[test]
    fn sync_light_state() {
        let frame = hex::decode("430000001a0000092901010606001007014cfef8383001141e000000000000")
            .unwrap();
        let endpoints = vec![endpoint(2345, 7, 137)];
        let parsed = parse_frame(&frame, &endpoints).unwrap();

        let InboundMessage::Sync { device_id, updates } = parsed else {
            panic!("expected sync message, got {parsed:?}");
        };
        assert_eq!(device_id, 2345);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[&2345],
            DeviceStatus {
                is_online: None,
                is_on: true,
                brightness: 76,
                color_mode: 254,
                rgb: (248, 56, 48),
            }
        );
    }

    #[test]
    fn sync_from_non_mesh_device_is_not_implemented() {
        // Same framing, but the originating device is a thermostat.
        let frame = hex::decode("430000001a0000092901010606001007014cfef8383001141e000000000000")
            .unwrap();
        let endpoints = vec![endpoint(2345, 7, 224)];
        assert!(matches!(
            parse_frame(&frame, &endpoints).unwrap_err(),
            ProtoError::NotImplemented(_)
        ));
    }

    #[test]
    fn bad_checksum_fails_the_frame() {
        let frame = hex::decode(concat!(
            "730000009100000d8002e5007e01010000f9527d5e0005000000050004008901",
            "00008901010000005000000039000000d796ff000700000100000001000000000",
            "0000000fe000000f8383000020000010000000101000000410000001e00000000",
            "000000e800000100000001010000005000000039000000000000001e000001000",
            "0000101000000500000003900000000000000127e"
        ))
        .unwrap();
        let endpoints = mesh_endpoints();
        assert!(matches!(
            parse_frame(&frame, &endpoints).unwrap_err(),
            ProtoError::BadChecksum { .. }
        ));
    }

    #[test]
    fn length_mismatch_is_reported_with_both_lengths() {
        let frame = hex::decode("430000001c0000092901010606001007014cfef8383001141e000000000000")
            .unwrap();
        let endpoints = vec![endpoint(2345, 7, 137)];
        let err = parse_frame(&frame, &endpoints).unwrap_err();
        let ProtoError::LengthMismatch { expected, actual } = err else {
            panic!("expected length mismatch, got {err:?}");
        };
        assert_eq!(expected, 28);
        assert_eq!(actual, 26);
    }
}
