//! Wire frame codec: turns a byte stream from the transport into one decoded
//! frame, or reports why it couldn't.
//!
//! The reference implementation (`etx_receive_chunk`) reads the whole frame
//! into a flat buffer and then overlays `ETX_OTA_*_` structs onto it via
//! pointer casts. Per the redesign note in SPEC_FULL.md §3.1/§9, this codec
//! never does that: it reads field-by-field off the wire and only ever hands
//! the caller a tagged [`RawFrame`] plus a borrowed payload slice. Turning
//! that into `total_size`/`expected_crc`/etc. is the state machine's job
//! (`session.rs`), which is also where the packet-kind-specific length
//! checks live.

use crate::config::{self, packet_type};
use crate::crc;
use crate::error::FramingError;
use crate::transport::SerialTransport;

/// The four packet kinds a frame can carry (§6). `Unknown` covers a type
/// byte we don't recognise — the frame is still structurally well-formed,
/// so it's up to the state machine to reject it (as an unexpected frame),
/// not the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Command,
    Header,
    Data,
    Response,
    Unknown(u8),
}

impl PacketKind {
    fn from_wire(byte: u8) -> Self {
        match byte {
            packet_type::COMMAND => PacketKind::Command,
            packet_type::DATA => PacketKind::Data,
            packet_type::HEADER => PacketKind::Header,
            packet_type::RESPONSE => PacketKind::Response,
            other => PacketKind::Unknown(other),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            PacketKind::Command => packet_type::COMMAND,
            PacketKind::Header => packet_type::HEADER,
            PacketKind::Data => packet_type::DATA,
            PacketKind::Response => packet_type::RESPONSE,
            PacketKind::Unknown(b) => b,
        }
    }
}

/// A structurally valid, CRC-checked frame. `payload` borrows from the
/// caller-supplied receive buffer and is only valid until the next call to
/// [`decode`].
pub struct RawFrame<'a> {
    pub kind: PacketKind,
    pub payload: &'a [u8],
}

/// Read exactly one frame from `transport` into `buf`, validating SOF/EOF,
/// the declared length, and (per the §9 CRC decision) the per-frame CRC32.
///
/// `buf` must be at least [`config::RECV_BUF_SIZE`] bytes; the returned
/// frame's payload is a subslice of it.
pub fn decode<'a, T: SerialTransport>(
    transport: &mut T,
    buf: &'a mut [u8],
) -> Result<RawFrame<'a>, FramingError> {
    debug_assert!(buf.len() >= config::RECV_BUF_SIZE);

    let mut header = [0u8; 4];
    transport
        .read_exact(&mut header[..1])
        .map_err(|_| FramingError::TransportFailed)?;
    if header[0] != config::SOF {
        return Err(FramingError::BadSof);
    }

    transport
        .read_exact(&mut header[1..2])
        .map_err(|_| FramingError::TransportFailed)?;
    let kind_byte = header[1];

    transport
        .read_exact(&mut header[2..4])
        .map_err(|_| FramingError::TransportFailed)?;
    let len = u16::from_le_bytes([header[2], header[3]]);

    if len as usize > config::MAX_PAYLOAD {
        return Err(FramingError::Oversized { len });
    }
    let len = len as usize;

    transport
        .read_exact(&mut buf[..len])
        .map_err(|_| FramingError::TransportFailed)?;

    let mut crc_bytes = [0u8; 4];
    transport
        .read_exact(&mut crc_bytes)
        .map_err(|_| FramingError::TransportFailed)?;
    let declared_crc = u32::from_le_bytes(crc_bytes);

    let mut eof = [0u8; 1];
    transport
        .read_exact(&mut eof)
        .map_err(|_| FramingError::TransportFailed)?;
    if eof[0] != config::EOF {
        return Err(FramingError::BadEof);
    }

    if crc::compute(&buf[..len]) != declared_crc {
        return Err(FramingError::FrameCrcMismatch);
    }

    Ok(RawFrame {
        kind: PacketKind::from_wire(kind_byte),
        payload: &buf[..len],
    })
}

/// Encode one complete frame (header, payload, CRC, EOF) into `buf` and
/// return the written slice. Used by the response emitter; exposed here
/// because it's the mirror image of [`decode`] and shares the wire layout.
pub fn encode<'a>(kind: PacketKind, payload: &[u8], crc32: u32, buf: &'a mut [u8]) -> &'a [u8] {
    let len = payload.len();
    let total = config::FRAME_OVERHEAD + len;
    assert!(buf.len() >= total, "encode buffer too small");

    buf[0] = config::SOF;
    buf[1] = kind.to_wire();
    buf[2..4].copy_from_slice(&(len as u16).to_le_bytes());
    buf[4..4 + len].copy_from_slice(payload);
    buf[4 + len..8 + len].copy_from_slice(&crc32.to_le_bytes());
    buf[8 + len] = config::EOF;

    &buf[..total]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn framed(kind_byte: u8, payload: &[u8], crc32: Option<u32>, eof: u8) -> Vec<u8> {
        let crc = crc32.unwrap_or_else(|| crc::compute(payload));
        let mut out = Vec::new();
        out.push(config::SOF);
        out.push(kind_byte);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&crc.to_le_bytes());
        out.push(eof);
        out
    }

    #[test]
    fn decode_command_roundtrip() {
        let wire = framed(packet_type::COMMAND, &[config::command::START], None, config::EOF);
        let mut transport = MockTransport::from_bytes(&wire);
        let mut buf = [0u8; config::RECV_BUF_SIZE];
        let frame = decode(&mut transport, &mut buf).expect("decode");
        assert_eq!(frame.kind, PacketKind::Command);
        assert_eq!(frame.payload, &[config::command::START]);
    }

    #[test]
    fn bad_sof_is_framing_error() {
        let mut wire = framed(packet_type::COMMAND, &[0], None, config::EOF);
        wire[0] = 0x00;
        let mut transport = MockTransport::from_bytes(&wire);
        let mut buf = [0u8; config::RECV_BUF_SIZE];
        assert_eq!(decode(&mut transport, &mut buf), Err(FramingError::BadSof));
    }

    #[test]
    fn bad_eof_is_framing_error() {
        let wire = framed(packet_type::COMMAND, &[config::command::START], None, 0xCC);
        let mut transport = MockTransport::from_bytes(&wire);
        let mut buf = [0u8; config::RECV_BUF_SIZE];
        assert_eq!(decode(&mut transport, &mut buf), Err(FramingError::BadEof));
    }

    #[test]
    fn oversized_length_rejected_before_reading_payload() {
        let mut raw = Vec::new();
        raw.push(config::SOF);
        raw.push(packet_type::DATA);
        raw.extend_from_slice(&0x1000u16.to_le_bytes());
        // Deliberately no payload/crc/eof bytes follow: decode must bail out
        // before trying to read them.
        let mut transport = MockTransport::from_bytes(&raw);
        let mut buf = [0u8; config::RECV_BUF_SIZE];
        assert_eq!(
            decode(&mut transport, &mut buf),
            Err(FramingError::Oversized { len: 0x1000 })
        );
    }

    #[test]
    fn wrong_frame_crc_rejected() {
        let wire = framed(packet_type::DATA, &[1, 2, 3], Some(0xDEAD_BEEF), config::EOF);
        let mut transport = MockTransport::from_bytes(&wire);
        let mut buf = [0u8; config::RECV_BUF_SIZE];
        assert_eq!(
            decode(&mut transport, &mut buf),
            Err(FramingError::FrameCrcMismatch)
        );
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = [0u8; config::RECV_BUF_SIZE];
        let payload = [1u8, 2, 3, 4];
        let crc32 = crc::compute(&payload);
        let wire = encode(PacketKind::Data, &payload, crc32, &mut buf).to_vec();
        let mut transport = MockTransport::from_bytes(&wire);
        let mut recv = [0u8; config::RECV_BUF_SIZE];
        let frame = decode(&mut transport, &mut recv).expect("decode");
        assert_eq!(frame.kind, PacketKind::Data);
        assert_eq!(frame.payload, &payload);
    }
}
