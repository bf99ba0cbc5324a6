//! Outer frame codec.
//!
//! Every message on the cloud TCP session is wrapped in the same five-byte
//! header: an info byte packing message type, response flag and protocol
//! version, followed by the payload length as a big-endian u32. Outer frames
//! are big-endian throughout; the inner pipe codec is little-endian and the
//! two deliberately share no integer-packing helpers.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtoError, ProtoResult};
use crate::wire::MessageType;

pub const HEADER_LEN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub msg_type: MessageType,
    pub is_response: bool,
    pub version: u8,
    pub payload_len: usize,
}

impl FrameHeader {
    /// Decodes the five header bytes at the front of `buf`.
    pub fn decode(buf: &[u8]) -> ProtoResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(ProtoError::LengthMismatch {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }
        let info = buf[0];
        let msg_type = MessageType::from_wire(info >> 4)
            .ok_or(ProtoError::NotImplemented("unknown outer message type"))?;
        let mut len_bytes = &buf[1..HEADER_LEN];
        let payload_len = len_bytes.get_u32() as usize;

        Ok(Self {
            msg_type,
            is_response: info & 0x08 != 0,
            version: info & 0x07,
            payload_len,
        })
    }
}

/// Wraps `payload` in an outer frame header.
#[must_use]
pub fn encode_frame(msg_type: MessageType, is_response: bool, version: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    let mut info = (msg_type as u8) << 4 | (version & 0x07);
    if is_response {
        info |= 0x08;
    }
    frame.put_u8(info);
    frame.put_u32(payload.len() as u32);
    frame.extend_from_slice(payload);
    frame
}

/// Incremental frame splitter for the TCP byte stream.
///
/// Socket reads arrive in arbitrary chunks; the assembler buffers them and
/// yields one complete frame (header plus payload) at a time. The payload
/// length in the header is trusted for splitting only; payload validation
/// happens in the parser.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
}

impl FrameAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Returns the next complete frame, or `None` until enough bytes arrive.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let payload_len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        let frame_len = HEADER_LEN + payload_len;
        if self.buf.len() < frame_len {
            return None;
        }
        Some(self.buf.split_to(frame_len).freeze())
    }
}
