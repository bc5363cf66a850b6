//! The serial transport: blocking byte-oriented reader/writer over one
//! channel. An external collaborator (§1) — this module gives it a narrow
//! trait boundary so the frame codec and state machine never touch a
//! register directly, and can be driven instead by [`MockTransport`] in
//! tests.

use crate::config;

/// Blocking read/write over one serial channel, 8-N-1. Implementations are
/// expected to block until every requested byte has arrived (or a transport
/// failure/advisory timeout occurs), matching `HAL_UART_Receive`'s
/// `HAL_MAX_DELAY` semantics in the reference implementation.
pub trait SerialTransport {
    /// Fill `buf` completely or report failure. On failure the contents of
    /// `buf` are unspecified.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ()>;

    /// Write every byte of `buf` or report failure.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), ()>;
}

/// Fixed-buffer, fault-injectable transport used by the unit tests in
/// `frame.rs` and `session.rs`. `no_std`-friendly (no allocation): the
/// backing storage is a caller-provided byte slice the mock reads from
/// front-to-back, recording every frame it was asked to write.
pub struct MockTransport<'a> {
    rx: &'a [u8],
    rx_pos: usize,
    /// If set, `read_exact` fails (simulating a link error or a timed-out
    /// read) once the read cursor reaches this offset.
    fail_at: Option<usize>,
    tx_log: [u8; 4096],
    tx_len: usize,
}

impl<'a> MockTransport<'a> {
    pub fn from_bytes(rx: &'a [u8]) -> Self {
        MockTransport { rx, rx_pos: 0, fail_at: None, tx_log: [0; 4096], tx_len: 0 }
    }

    /// Fail the read that would otherwise start at byte offset `at` in the
    /// scripted input, simulating a dropped link mid-frame.
    pub fn fail_at(rx: &'a [u8], at: usize) -> Self {
        MockTransport { rx, rx_pos: 0, fail_at: Some(at), tx_log: [0; 4096], tx_len: 0 }
    }

    /// Everything written so far, in order, concatenated.
    pub fn written(&self) -> &[u8] {
        &self.tx_log[..self.tx_len]
    }

    /// Number of complete response frames written (each framed reply is
    /// exactly `config::FRAME_OVERHEAD + 1` bytes, per §4.4).
    pub fn response_count(&self) -> usize {
        self.tx_len / (config::FRAME_OVERHEAD + 1)
    }

    /// The status byte of the nth response frame written (0-indexed).
    pub fn response_status(&self, n: usize) -> u8 {
        let stride = config::FRAME_OVERHEAD + 1;
        self.tx_log[n * stride + 4]
    }
}

impl<'a> SerialTransport for MockTransport<'a> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ()> {
        if let Some(at) = self.fail_at {
            if self.rx_pos >= at {
                return Err(());
            }
        }
        if self.rx_pos + buf.len() > self.rx.len() {
            return Err(());
        }
        buf.copy_from_slice(&self.rx[self.rx_pos..self.rx_pos + buf.len()]);
        self.rx_pos += buf.len();
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), ()> {
        if self.tx_len + buf.len() > self.tx_log.len() {
            return Err(());
        }
        self.tx_log[self.tx_len..self.tx_len + buf.len()].copy_from_slice(buf);
        self.tx_len += buf.len();
        Ok(())
    }
}

/// Register-level transport for the target MCU's debug/update UART. Kept
/// thin and blocking, in the style of the teacher's `gps_uart` driver but
/// polled rather than DMA/interrupt-driven — this link only ever does one
/// request-reply exchange at a time, so there is no benefit to the
/// teacher's double-buffered DMA scheme here.
#[cfg(target_os = "none")]
pub struct UartTransport {
    deadline_cycles: u32,
}

#[cfg(target_os = "none")]
impl UartTransport {
    pub fn new() -> Self {
        UartTransport { deadline_cycles: crate::cpu::CPU_FREQ / 1000 * config::FRAME_READ_TIMEOUT_MS }
    }

    fn uart() -> &'static stm32f4::stm32f411::USART2 {
        unsafe { &*stm32f4::stm32f411::USART2::ptr() }
    }

    fn read_byte_with_timeout(&self) -> Result<u8, ()> {
        let uart = Self::uart();
        let mut waited = 0u32;
        while !uart.sr.read().rxne().bit() {
            if waited >= self.deadline_cycles {
                return Err(());
            }
            waited += 1;
            crate::cpu::nothing();
        }
        Ok(uart.dr.read().dr().bits() as u8)
    }

    fn write_byte(&self, byte: u8) -> Result<(), ()> {
        let uart = Self::uart();
        while !uart.sr.read().txe().bit() {}
        uart.dr.write(|w| w.dr().bits(byte as u16));
        Ok(())
    }
}

#[cfg(target_os = "none")]
impl SerialTransport for UartTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ()> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte_with_timeout()?;
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), ()> {
        for &b in buf {
            self.write_byte(b)?;
        }
        Ok(())
    }
}
