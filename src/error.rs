//! Error taxonomy for one update session.
//!
//! Hand-rolled rather than built on an error-derive crate, matching the
//! teacher's own command-dispatch `Error` enum: this crate is `no_std` with
//! no allocator, and every error here is small, fixed-shape, and only ever
//! needs a `Display` impl for the debug log line that accompanies the NACK.

use core::fmt;

/// Why the frame codec refused to hand back a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// The SOF byte didn't match.
    BadSof,
    /// The EOF byte didn't match.
    BadEof,
    /// `payload_length` exceeded the compiled-in buffer capacity.
    Oversized { len: u16 },
    /// The transport reported a read or write failure (including an
    /// advisory timeout expiring).
    TransportFailed,
    /// A frame's declared CRC32 did not match the CRC32 computed over its
    /// payload (§9 CRC policy).
    FrameCrcMismatch,
    /// The header's `expected_crc` did not match the running CRC32 of the
    /// programmed image at End (§9 CRC policy).
    ImageCrcMismatch,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::BadSof => write!(f, "bad SOF marker"),
            FramingError::BadEof => write!(f, "bad EOF marker"),
            FramingError::Oversized { len } => write!(f, "payload length {len} exceeds MAX_PAYLOAD"),
            FramingError::TransportFailed => write!(f, "transport read/write failed"),
            FramingError::FrameCrcMismatch => write!(f, "frame CRC32 mismatch"),
            FramingError::ImageCrcMismatch => write!(f, "image CRC32 mismatch at End"),
        }
    }
}

/// A structurally valid frame that is wrong for the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// Frame kind not accepted in the current state.
    UnexpectedFrame,
    /// A Command frame carried a `cmd` byte we don't recognise.
    UnknownCommand,
    /// A second Header arrived outside the Header state.
    DuplicateHeader,
    /// An empty Data frame arrived before the image was fully received.
    EmptyDataTooSoon,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::UnexpectedFrame => write!(f, "frame not valid in current state"),
            StateError::UnknownCommand => write!(f, "unrecognised command byte"),
            StateError::DuplicateHeader => write!(f, "header already received"),
            StateError::EmptyDataTooSoon => write!(f, "empty data frame before transfer complete"),
        }
    }
}

/// Which step of `program_chunk` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    Unlock,
    Erase,
    Program { offset: u32 },
    Lock,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::Unlock => write!(f, "flash unlock failed"),
            FlashError::Erase => write!(f, "flash erase failed"),
            FlashError::Program { offset } => write!(f, "flash program failed at offset {offset}"),
            FlashError::Lock => write!(f, "flash lock failed"),
        }
    }
}

/// Everything that can end a session with a NACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Framing(FramingError),
    State(StateError),
    Flash(FlashError),
    /// The sender sent Command{Abort}.
    AbortRequested,
}

impl From<FramingError> for SessionError {
    fn from(e: FramingError) -> Self {
        SessionError::Framing(e)
    }
}

impl From<StateError> for SessionError {
    fn from(e: StateError) -> Self {
        SessionError::State(e)
    }
}

impl From<FlashError> for SessionError {
    fn from(e: FlashError) -> Self {
        SessionError::Flash(e)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Framing(e) => write!(f, "framing error: {e}"),
            SessionError::State(e) => write!(f, "state error: {e}"),
            SessionError::Flash(e) => write!(f, "flash error: {e}"),
            SessionError::AbortRequested => write!(f, "abort requested by sender"),
        }
    }
}
