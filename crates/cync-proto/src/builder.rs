//! Outbound packet builders.
//!
//! Each builder returns a complete, ready-to-write byte sequence including
//! the outer header. Pipe-carried commands draw their counters from the
//! shared sequences in [`crate::seq`].

use bytes::BufMut;

use crate::frame::encode_frame;
use crate::pipe;
use crate::seq::{OUTER_COUNTER, PIPE_SEQUENCE};
use crate::wire::{MessageType, PipeCommand, PipeDirection, PROTOCOL_VERSION};

/// Login request carrying the user's authorize token.
#[must_use]
pub fn login_request(authorize: &str, user_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(10 + authorize.len());
    payload.put_u8(PROTOCOL_VERSION);
    payload.put_u32(user_id);
    payload.put_u16(authorize.len() as u16);
    payload.extend_from_slice(authorize.as_bytes());
    payload.extend_from_slice(&[0x00, 0x00, 0x1E]);

    encode_frame(MessageType::Login, false, PROTOCOL_VERSION, &payload)
}

/// Reachability probe for a single device.
#[must_use]
pub fn probe_request(device_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.put_u32(device_id);
    payload.put_u16(OUTER_COUNTER.next() as u16);
    payload.put_u8(0x00);
    payload.put_u8(0x02);

    encode_frame(MessageType::Probe, false, PROTOCOL_VERSION, &payload)
}

/// Keep-alive ping, sent every heartbeat interval.
#[must_use]
pub fn heartbeat() -> Vec<u8> {
    vec![0xD3, 0x00, 0x00, 0x00, 0x00]
}

/// Graceful goodbye, sent on shutdown.
#[must_use]
pub fn disconnect_request() -> Vec<u8> {
    vec![0xE3, 0x00, 0x00, 0x00, 0x01, 0x03]
}

/// Wraps an inner pipe frame in the outer pipe envelope addressed to a hub.
fn pipe_request(hub_device_id: u32, command: PipeCommand, args: &[u8]) -> Vec<u8> {
    let inner = pipe::encode(PIPE_SEQUENCE.next(), PipeDirection::Request, command, args);

    let mut payload = Vec::with_capacity(7 + inner.len());
    payload.put_u32(hub_device_id);
    payload.put_u16(OUTER_COUNTER.next() as u16);
    payload.put_u8(0x00);
    payload.extend_from_slice(&inner);

    encode_frame(MessageType::Pipe, false, PROTOCOL_VERSION, &payload)
}

/// Queries the full device-status pages from a hub (limit 0xFFFF, offset 0).
#[must_use]
pub fn state_query_request(hub_device_id: u32) -> Vec<u8> {
    let args = [0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00];
    pipe_request(hub_device_id, PipeCommand::QueryDeviceStatusPages, &args)
}

#[must_use]
pub fn set_power_request(hub_device_id: u32, mesh_ref: u8, is_on: bool) -> Vec<u8> {
    let mesh = u16::from(mesh_ref).to_le_bytes();
    let args = [
        0x00,
        mesh[0],
        mesh[1],
        PipeCommand::SetPower as u8,
        0x11,
        0x02,
        u8::from(is_on),
        0x00,
        0x00,
    ];
    pipe_request(hub_device_id, PipeCommand::SetPower, &args)
}

/// Brightness is a percentage; the caller clamps to 0..=100.
#[must_use]
pub fn set_brightness_request(hub_device_id: u32, mesh_ref: u8, brightness: u8) -> Vec<u8> {
    let mesh = u16::from(mesh_ref).to_le_bytes();
    let args = [
        0x00,
        mesh[0],
        mesh[1],
        PipeCommand::SetBrightness as u8,
        0x11,
        0x02,
        brightness,
    ];
    pipe_request(hub_device_id, PipeCommand::SetBrightness, &args)
}

/// Color temperature is a 1..=100 scale from most blue to most orange.
#[must_use]
pub fn set_color_temp_request(hub_device_id: u32, mesh_ref: u8, color_temp: u8) -> Vec<u8> {
    let mesh = u16::from(mesh_ref).to_le_bytes();
    let args = [
        0x00,
        mesh[0],
        mesh[1],
        PipeCommand::SetColor as u8,
        0x11,
        0x02,
        0x05,
        color_temp,
    ];
    pipe_request(hub_device_id, PipeCommand::SetColor, &args)
}

#[must_use]
pub fn set_rgb_request(hub_device_id: u32, mesh_ref: u8, rgb: (u8, u8, u8)) -> Vec<u8> {
    let mesh = u16::from(mesh_ref).to_le_bytes();
    let args = [
        0x00,
        mesh[0],
        mesh[1],
        PipeCommand::SetColor as u8,
        0x11,
        0x02,
        0x04,
        rgb.0,
        rgb.1,
        rgb.2,
    ];
    pipe_request(hub_device_id, PipeCommand::SetColor, &args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameHeader, HEADER_LEN};
    use crate::pipe::decode;

    fn inner_frame(outer: &[u8]) -> &[u8] {
        // Outer pipe payload: device id (4) + counter (2) + 0x00, then the
        // delimited inner frame.
        &outer[HEADER_LEN + 7..]
    }

    #[test]
    fn login_request_layout() {
        let frame = login_request("abc123", 0x0102_0304);
        let header = FrameHeader::decode(&frame).unwrap();
        assert_eq!(header.msg_type, MessageType::Login);
        assert!(!header.is_response);
        assert_eq!(header.version, 3);

        let payload = &frame[HEADER_LEN..];
        assert_eq!(payload[0], 3);
        assert_eq!(&payload[1..5], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&payload[5..7], &[0x00, 0x06]);
        assert_eq!(&payload[7..13], b"abc123");
        assert_eq!(&payload[13..], &[0x00, 0x00, 0x1E]);
    }

    #[test]
    fn probe_request_layout() {
        let frame = probe_request(1_234_567_890);
        let header = FrameHeader::decode(&frame).unwrap();
        assert_eq!(header.msg_type, MessageType::Probe);
        assert_eq!(header.payload_len, 8);

        let payload = &frame[HEADER_LEN..];
        assert_eq!(&payload[0..4], &1_234_567_890u32.to_be_bytes());
        assert_eq!(payload[6], 0x00);
        assert_eq!(payload[7], 0x02);
    }

    #[test]
    fn heartbeat_and_disconnect_literals() {
        assert_eq!(heartbeat(), vec![0xD3, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(disconnect_request(), vec![0xE3, 0x00, 0x00, 0x00, 0x01, 0x03]);
    }

    #[test]
    fn state_query_roundtrip() {
        let frame = state_query_request(42);
        let header = FrameHeader::decode(&frame).unwrap();
        assert_eq!(header.msg_type, MessageType::Pipe);

        let payload = &frame[HEADER_LEN..];
        assert_eq!(&payload[0..4], &42u32.to_be_bytes());
        assert_eq!(payload[6], 0x00);

        let inner = decode(inner_frame(&frame)).unwrap();
        assert_eq!(inner.command, PipeCommand::QueryDeviceStatusPages as u8);
        assert_eq!(inner.direction, PipeDirection::Request as u8);
        assert_eq!(inner.args, vec![0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn set_power_roundtrip() {
        let frame = set_power_request(42, 7, true);
        let inner = decode(inner_frame(&frame)).unwrap();
        assert_eq!(inner.command, PipeCommand::SetPower as u8);
        assert_eq!(
            inner.args,
            vec![0x00, 0x07, 0x00, 0xD0, 0x11, 0x02, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn set_brightness_roundtrip() {
        let frame = set_brightness_request(42, 232, 80);
        let inner = decode(inner_frame(&frame)).unwrap();
        assert_eq!(inner.command, PipeCommand::SetBrightness as u8);
        assert_eq!(inner.args, vec![0x00, 0xE8, 0x00, 0xD2, 0x11, 0x02, 0x50]);
    }

    #[test]
    fn set_color_temp_roundtrip() {
        let frame = set_color_temp_request(42, 7, 100);
        let inner = decode(inner_frame(&frame)).unwrap();
        assert_eq!(inner.command, PipeCommand::SetColor as u8);
        assert_eq!(inner.args, vec![0x00, 0x07, 0x00, 0xE2, 0x11, 0x02, 0x05, 0x64]);
    }

    #[test]
    fn set_rgb_roundtrip() {
        let frame = set_rgb_request(42, 7, (215, 150, 255));
        let inner = decode(inner_frame(&frame)).unwrap();
        assert_eq!(inner.command, PipeCommand::SetColor as u8);
        assert_eq!(
            inner.args,
            vec![0x00, 0x07, 0x00, 0xE2, 0x11, 0x02, 0x04, 0xD7, 0x96, 0xFF]
        );
    }
}
