//! State machine and session driver (§4.2, §4.5).
//!
//! Per the redesign note in §9, the four session variables are bundled into
//! one [`SessionState`] record instead of living at file scope the way the
//! reference implementation's globals do. `run_session` owns one, passes it
//! by mutable reference through each frame dispatch, and the whole thing
//! goes out of scope when the session ends — no reset-on-entry needed, and
//! tests can construct as many independent sessions as they like.

use crate::config::{self, command, packet_type};
use crate::crc::Crc32;
use crate::error::{SessionError, StateError};
use crate::flash::FlashMemory;
use crate::frame::{self, PacketKind};
use crate::response;
use crate::transport::SerialTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    Header,
    Data,
    End,
    Idle,
}

/// The session variables from §3, bundled into one record rather than left
/// as file-scope globals.
pub struct SessionState {
    pub state: State,
    pub total_size: u32,
    pub expected_crc: u32,
    pub received_size: u32,
    running_crc: Crc32,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            state: State::Start,
            total_size: 0,
            expected_crc: 0,
            received_size: 0,
            running_crc: Crc32::new(),
        }
    }
}

/// Dispatch one decoded frame against the current state. Returns `Ok(())`
/// on ACK, `Err` on NACK; the caller (`run_session`) is responsible for
/// actually writing the response and deciding whether to continue.
fn dispatch<F: FlashMemory>(
    session: &mut SessionState,
    flash: &mut F,
    frame: &frame::RawFrame<'_>,
) -> Result<(), SessionError> {
    // Abort is accepted in any state (§4.2).
    if frame.kind == PacketKind::Command {
        if let Some(&cmd) = frame.payload.first() {
            if cmd == command::ABORT {
                return Err(SessionError::AbortRequested);
            }
        }
    }

    match session.state {
        State::Start => {
            let cmd = expect_command(frame)?;
            if cmd != command::START {
                return Err(StateError::UnknownCommand.into());
            }
            session.state = State::Header;
            Ok(())
        }

        State::Header => {
            if frame.kind != PacketKind::Header {
                return Err(StateError::UnexpectedFrame.into());
            }
            if frame.payload.len() < config::HEADER_PAYLOAD_LEN {
                return Err(StateError::UnexpectedFrame.into());
            }
            let total_size = u32::from_le_bytes(frame.payload[0..4].try_into().unwrap());
            let expected_crc = u32::from_le_bytes(frame.payload[4..8].try_into().unwrap());
            session.total_size = total_size;
            session.expected_crc = expected_crc;
            session.state = State::Data;
            Ok(())
        }

        State::Data => {
            if frame.kind == PacketKind::Header {
                // A second Header must not mutate total_size/expected_crc.
                return Err(StateError::DuplicateHeader.into());
            }
            if frame.kind != PacketKind::Data {
                return Err(StateError::UnexpectedFrame.into());
            }
            let remaining = session.total_size - session.received_size;
            if frame.payload.is_empty() && remaining != 0 {
                return Err(StateError::EmptyDataTooSoon.into());
            }

            let to_write = core::cmp::min(frame.payload.len() as u32, remaining) as usize;
            let chunk = &frame.payload[..to_write];
            let is_first = session.received_size == 0;

            let written = crate::flash::program_chunk(flash, session.received_size, chunk, is_first)?;
            session.running_crc.update(&chunk[..written]);
            session.received_size += written as u32;

            if session.received_size >= session.total_size {
                session.state = State::End;
            }
            Ok(())
        }

        State::End => {
            let cmd = expect_command(frame)?;
            if cmd != command::END {
                return Err(StateError::UnknownCommand.into());
            }
            if session.running_crc.finish() != session.expected_crc {
                return Err(crate::error::FramingError::ImageCrcMismatch.into());
            }
            session.state = State::Idle;
            Ok(())
        }

        State::Idle => {
            // Benign: any further frame is ACKed and ends the session.
            Ok(())
        }
    }
}

fn expect_command(frame: &frame::RawFrame<'_>) -> Result<u8, StateError> {
    if frame.kind != PacketKind::Command {
        return Err(StateError::UnexpectedFrame);
    }
    frame.payload.first().copied().ok_or(StateError::UnexpectedFrame)
}

/// Drive one complete update attempt to completion: read a frame, dispatch
/// it, respond, and repeat until the state machine reaches Idle or a frame
/// is rejected. Matches the loop shape of §4.5.
pub fn run_session<T: SerialTransport, F: FlashMemory>(
    transport: &mut T,
    flash: &mut F,
) -> Result<(), SessionError> {
    let mut session = SessionState::new();
    let mut buf = [0u8; config::RECV_BUF_SIZE];

    loop {
        let outcome = frame::decode(transport, &mut buf).map_err(SessionError::from);

        let result = match outcome {
            Ok(frame) => {
                crate::dbgln!("frame kind={:?} state={:?}", frame.kind, session.state);
                dispatch(&mut session, flash, &frame)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                let _ = response::ack(transport);
                if session.state == State::Idle {
                    return Ok(());
                }
            }
            Err(e) => {
                let _ = response::nack(transport);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::MockFlash;
    use crate::transport::MockTransport;
    use crate::crc;

    fn frame_bytes(kind_byte: u8, payload: &[u8]) -> std::vec::Vec<u8> {
        let crc32 = crc::compute(payload);
        let mut out = std::vec::Vec::new();
        out.push(config::SOF);
        out.push(kind_byte);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&crc32.to_le_bytes());
        out.push(config::EOF);
        out
    }

    fn header_payload(total_size: u32, expected_crc: u32) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&total_size.to_le_bytes());
        buf[4..8].copy_from_slice(&expected_crc.to_le_bytes());
        buf
    }

    #[test]
    fn s1_happy_path_three_byte_image() {
        let image = [0xDEu8, 0xAD, 0xBE];
        let image_crc = crc::compute(&image);

        let mut wire = std::vec::Vec::new();
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::START]));
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(3, image_crc)));
        wire.extend(frame_bytes(packet_type::DATA, &image));
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::END]));

        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);

        assert!(result.is_ok());
        assert_eq!(transport.response_count(), 4);
        for i in 0..4 {
            assert_eq!(transport.response_status(i), config::status::ACK);
        }
        assert_eq!(&flash.contents()[..3], &image);
    }

    #[test]
    fn s2_wrong_first_frame() {
        let wire = frame_bytes(packet_type::HEADER, &header_payload(3, 0));
        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);
        assert_eq!(result, Err(StateError::UnexpectedFrame.into()));
        assert_eq!(transport.response_status(0), config::status::NACK);
    }

    #[test]
    fn s3_oversized_length() {
        let mut wire = std::vec::Vec::new();
        wire.push(config::SOF);
        wire.push(packet_type::DATA);
        wire.extend_from_slice(&0x1000u16.to_le_bytes());
        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);
        assert!(result.is_err());
        assert_eq!(transport.response_status(0), config::status::NACK);
    }

    #[test]
    fn s4_abort_mid_transfer() {
        let mut wire = std::vec::Vec::new();
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::START]));
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(3, 0)));
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::ABORT]));

        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);

        assert_eq!(result, Err(SessionError::AbortRequested));
        assert_eq!(transport.response_count(), 3);
        assert_eq!(transport.response_status(0), config::status::ACK);
        assert_eq!(transport.response_status(1), config::status::ACK);
        assert_eq!(transport.response_status(2), config::status::NACK);
    }

    #[test]
    fn s5_flash_program_failure_on_third_byte() {
        let image = [1u8, 2, 3, 4, 5];
        let mut wire = std::vec::Vec::new();
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::START]));
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(5, crc::compute(&image))));
        wire.extend(frame_bytes(packet_type::DATA, &image));

        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::failing_at(2);
        let result = run_session(&mut transport, &mut flash);

        assert!(matches!(result, Err(SessionError::Flash(_))));
        assert_eq!(transport.response_status(2), config::status::NACK);
    }

    #[test]
    fn s6_bad_eof_marker() {
        let mut wire = frame_bytes(packet_type::COMMAND, &[command::START]);
        let last = wire.len() - 1;
        wire[last] = 0xCC;
        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);
        assert!(result.is_err());
        assert_eq!(transport.response_status(0), config::status::NACK);
    }

    #[test]
    fn s7_per_frame_crc_mismatch() {
        let mut wire = std::vec::Vec::new();
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::START]));
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(3, 0)));
        // Data frame with a declared CRC that doesn't match its payload.
        let mut bad_data = std::vec::Vec::new();
        bad_data.push(config::SOF);
        bad_data.push(packet_type::DATA);
        bad_data.extend_from_slice(&3u16.to_le_bytes());
        bad_data.extend_from_slice(&[1, 2, 3]);
        bad_data.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bad_data.push(config::EOF);
        wire.extend(bad_data);

        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);

        assert!(matches!(result, Err(SessionError::Framing(crate::error::FramingError::FrameCrcMismatch))));
        assert_eq!(transport.response_status(2), config::status::NACK);
    }

    #[test]
    fn dispatch_rejects_duplicate_header_without_touching_session_fields() {
        let mut session = SessionState::new();
        session.state = State::Data;
        session.total_size = 3;
        session.expected_crc = 0xAAAA_AAAA;
        let mut flash = MockFlash::new();

        let buf = header_payload(99, 0x1111_1111);
        let frame = frame::RawFrame { kind: PacketKind::Header, payload: &buf[..] };
        let result = dispatch(&mut session, &mut flash, &frame);

        assert_eq!(result, Err(StateError::DuplicateHeader.into()));
        assert_eq!(session.total_size, 3);
        assert_eq!(session.expected_crc, 0xAAAA_AAAA);
        assert_eq!(session.state, State::Data);
    }

    #[test]
    fn duplicate_header_in_data_state_is_rejected_without_mutation() {
        let mut wire = std::vec::Vec::new();
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::START]));
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(3, 0xAAAA_AAAA)));
        // A second Header arrives while in the Data state.
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(99, 0x1111_1111)));

        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);

        assert_eq!(result, Err(StateError::DuplicateHeader.into()));
        assert_eq!(transport.response_status(2), config::status::NACK);
    }

    #[test]
    fn s8_image_crc_mismatch_at_end() {
        let image = [0xDEu8, 0xAD, 0xBE];
        let mut wire = std::vec::Vec::new();
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::START]));
        // Declares the wrong expected_crc on purpose.
        wire.extend(frame_bytes(packet_type::HEADER, &header_payload(3, 0x1234_5678)));
        wire.extend(frame_bytes(packet_type::DATA, &image));
        wire.extend(frame_bytes(packet_type::COMMAND, &[command::END]));

        let mut transport = MockTransport::from_bytes(&wire);
        let mut flash = MockFlash::new();
        let result = run_session(&mut transport, &mut flash);

        assert_eq!(
            result,
            Err(SessionError::Framing(crate::error::FramingError::ImageCrcMismatch))
        );
        assert_eq!(transport.response_status(3), config::status::NACK);
    }
}
