//! Response emitter: ACK/NACK frames sent back to the sender (§4.4).
//!
//! The reference implementation hardcodes the response CRC field to zero
//! (`etx_ota_send_resp`: `.crc = 0u, //TODO: Add CRC`) and never validates it
//! on the other end. SPEC_FULL.md §9 keeps that quirk on purpose — this is a
//! one-way status byte, not a payload worth protecting — so [`send`] writes
//! a literal `0` CRC rather than computing one over the status byte.

use crate::config::{self, status};
use crate::frame::{self, PacketKind};
use crate::transport::SerialTransport;

/// Send one Response frame carrying a single status byte.
pub fn send<T: SerialTransport>(transport: &mut T, ack: bool) -> Result<(), ()> {
    let mut buf = [0u8; config::FRAME_OVERHEAD + 1];
    let payload = [if ack { status::ACK } else { status::NACK }];
    let wire = frame::encode(PacketKind::Response, &payload, 0, &mut buf);
    transport.write_all(wire)
}

pub fn ack<T: SerialTransport>(transport: &mut T) -> Result<(), ()> {
    send(transport, true)
}

pub fn nack<T: SerialTransport>(transport: &mut T) -> Result<(), ()> {
    send(transport, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn ack_frame_has_zero_crc_and_ack_status() {
        let mut transport = MockTransport::from_bytes(&[]);
        ack(&mut transport).unwrap();
        let written = transport.written();
        assert_eq!(written[0], config::SOF);
        assert_eq!(written[1], config::packet_type::RESPONSE);
        assert_eq!(&written[2..4], &1u16.to_le_bytes());
        assert_eq!(written[4], status::ACK);
        assert_eq!(&written[5..9], &0u32.to_le_bytes());
        assert_eq!(written[9], config::EOF);
    }

    #[test]
    fn nack_carries_nack_status() {
        let mut transport = MockTransport::from_bytes(&[]);
        nack(&mut transport).unwrap();
        assert_eq!(transport.response_status(0), status::NACK);
    }
}
