//! Compile-time constants for the update protocol.
//!
//! Gathered in one place so the wire layout, buffer sizing and flash
//! geometry are easy to audit together; the reference implementation (and
//! the board bring-up this crate is descended from) instead scatters these
//! across each module that needs one.

/// Start-of-frame marker.
pub const SOF: u8 = 0xAA;
/// End-of-frame marker.
pub const EOF: u8 = 0xBB;

/// Wire packet types (offset 1 of every frame).
pub mod packet_type {
    pub const COMMAND: u8 = 0;
    pub const DATA: u8 = 1;
    pub const HEADER: u8 = 2;
    pub const RESPONSE: u8 = 3;
}

/// Command payload values (the single byte carried by a Command frame).
pub mod command {
    pub const ABORT: u8 = 0;
    pub const END: u8 = 1;
    pub const START: u8 = 2;
}

/// Response status byte.
pub mod status {
    pub const ACK: u8 = 0;
    pub const NACK: u8 = 1;
}

/// Largest payload a frame may carry. The receive buffer must be sized to
/// hold this plus the 9 bytes of framing overhead (SOF, type, length, CRC,
/// EOF).
pub const MAX_PAYLOAD: usize = 1024;

/// Framing overhead: SOF(1) + type(1) + length(2) + CRC(4) + EOF(1).
pub const FRAME_OVERHEAD: usize = 9;

/// Total bytes the receive buffer must hold.
pub const RECV_BUF_SIZE: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

/// Fixed size of a Header frame's payload: `total_size: u32` followed by
/// `expected_crc: u32`, little-endian. A sender may pad the payload with
/// further metadata; any bytes past this length are ignored.
pub const HEADER_PAYLOAD_LEN: usize = 8;

/// Advisory per-read timeout. Not enforced by the frame codec itself (it has
/// no notion of time) but expected of any blocking transport adapter; its
/// expiry is surfaced to the codec as an ordinary read failure.
pub const FRAME_READ_TIMEOUT_MS: u32 = 10_000;

/// Start of the application region: sector 5 on the STM32F4 this build
/// targets, matching the linker script the application image is built
/// against.
pub const APP_BASE: u32 = 0x0800_4000;

/// Sector numbers making up the application region (STM32F4 sector
/// numbering). Two 128KiB sectors, matching the original reference's
/// `FLASH_SECTOR_5`/`NbSectors = 2`.
pub const APP_REGION_SECTORS: [u8; 2] = [5, 6];
