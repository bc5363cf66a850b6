//! Flash memory handling for the application region.
//!
//! An external collaborator (§1): this module wraps the MCU flash
//! controller behind a narrow trait so the session driver never pokes a
//! register directly, and can be driven by [`MockFlash`] in tests. The
//! hardware adapter keeps the unlock/erase/program/lock discipline of the
//! teacher's own `flash.rs` (magic key pair, busy-wait-then-clear-errors),
//! retargeted at the STM32F4 application region named in the original
//! reference implementation (sectors 5 and 6, `FLASH_VOLTAGE_RANGE_3`).

use crate::config::APP_BASE;
use crate::error::FlashError;

/// Unlock, erase, program and lock the application region. One byte at a
/// time is the lowest common denominator (§4.3); an implementation backed
/// by a controller with a wider program unit may batch internally as long
/// as `program_byte`'s per-byte contract is preserved from the caller's
/// point of view.
pub trait FlashMemory {
    fn unlock(&mut self) -> Result<(), FlashError>;
    /// Erase the whole application region (both configured sectors).
    fn erase_app_region(&mut self) -> Result<(), FlashError>;
    fn program_byte(&mut self, addr: u32, value: u8) -> Result<(), FlashError>;
    fn lock(&mut self) -> Result<(), FlashError>;
}

/// Drive one `program_chunk` call: unlock, erase on the first chunk only,
/// program byte-by-byte (stopping at the first failure), then lock
/// regardless of how programming went. Returns the number of bytes actually
/// written, which may be less than `bytes.len()` on a mid-chunk failure.
///
/// This is the shared procedure described in §4.3; it's generic over
/// [`FlashMemory`] so both the hardware adapter and [`MockFlash`] exercise
/// exactly the same unlock/erase/program/lock sequencing.
pub fn program_chunk<F: FlashMemory>(
    flash: &mut F,
    base_offset: u32,
    bytes: &[u8],
    is_first: bool,
) -> Result<usize, FlashError> {
    flash.unlock().map_err(|_| FlashError::Unlock)?;

    if is_first && flash.erase_app_region().is_err() {
        // Unlock succeeded but erase failed: the region may now be
        // partially erased. Per §7 the whole session is fatal anyway, so we
        // don't attempt to re-lock on this path — the caller tears the
        // session down.
        return Err(FlashError::Erase);
    }

    let mut written = 0usize;
    for (i, &byte) in bytes.iter().enumerate() {
        let addr = APP_BASE + base_offset + i as u32;
        if flash.program_byte(addr, byte).is_err() {
            let _ = flash.lock();
            return Err(FlashError::Program { offset: base_offset + i as u32 });
        }
        written += 1;
    }

    flash.lock().map_err(|_| FlashError::Lock)?;
    Ok(written)
}

/// In-memory flash fixture for tests: a fixed-size byte array standing in
/// for the application region, with optional fault injection at a chosen
/// byte offset (for scenario S5: "flash program failure on the third
/// byte").
pub struct MockFlash {
    region: [u8; Self::SIZE],
    unlocked: bool,
    fail_at_offset: Option<u32>,
}

impl MockFlash {
    pub const SIZE: usize = 64 * 1024;

    pub fn new() -> Self {
        MockFlash { region: [0xFF; Self::SIZE], unlocked: false, fail_at_offset: None }
    }

    /// `program_byte` at this absolute offset from `APP_BASE` fails, and no
    /// further bytes in that call are attempted.
    pub fn failing_at(offset: u32) -> Self {
        let mut f = Self::new();
        f.fail_at_offset = Some(offset);
        f
    }

    pub fn contents(&self) -> &[u8] {
        &self.region
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }
}

impl FlashMemory for MockFlash {
    fn unlock(&mut self) -> Result<(), FlashError> {
        self.unlocked = true;
        Ok(())
    }

    fn erase_app_region(&mut self) -> Result<(), FlashError> {
        if !self.unlocked {
            return Err(FlashError::Erase);
        }
        self.region = [0xFF; Self::SIZE];
        Ok(())
    }

    fn program_byte(&mut self, addr: u32, value: u8) -> Result<(), FlashError> {
        let offset = addr - APP_BASE;
        if !self.unlocked {
            return Err(FlashError::Program { offset });
        }
        if self.fail_at_offset == Some(offset) {
            return Err(FlashError::Program { offset });
        }
        self.region[offset as usize] = value;
        Ok(())
    }

    fn lock(&mut self) -> Result<(), FlashError> {
        self.unlocked = false;
        Ok(())
    }
}

/// Register-level adapter for the STM32F4 embedded flash controller.
#[cfg(target_os = "none")]
pub struct Stm32F4Flash;

#[cfg(target_os = "none")]
impl Stm32F4Flash {
    pub fn new() -> Self {
        Stm32F4Flash
    }

    fn regs() -> &'static stm32f4::stm32f411::FLASH {
        unsafe { &*stm32f4::stm32f411::FLASH::ptr() }
    }

    fn busy() -> bool {
        Self::regs().sr.read().bsy().bit()
    }

    fn wait_and_check() -> Result<(), ()> {
        while Self::busy() {}
        let sr = Self::regs().sr.read();
        let errors =
            sr.pgaerr().bit() || sr.pgperr().bit() || sr.pgserr().bit() || sr.wrperr().bit();
        Self::regs().sr.write(|w| {
            w.pgaerr().set_bit().pgperr().set_bit().pgserr().set_bit().wrperr().set_bit()
        });
        if errors {
            Err(())
        } else {
            Ok(())
        }
    }
}

#[cfg(target_os = "none")]
impl FlashMemory for Stm32F4Flash {
    fn unlock(&mut self) -> Result<(), FlashError> {
        let flash = Self::regs();
        if !flash.cr.read().lock().bit() {
            return Ok(());
        }
        flash.keyr.write(|w| unsafe { w.bits(0x4567_0123) });
        flash.keyr.write(|w| unsafe { w.bits(0xCDEF_89AB) });
        if flash.cr.read().lock().bit() {
            Err(FlashError::Unlock)
        } else {
            Ok(())
        }
    }

    fn erase_app_region(&mut self) -> Result<(), FlashError> {
        for &sector in crate::config::APP_REGION_SECTORS.iter() {
            let flash = Self::regs();
            flash.cr.modify(|_, w| unsafe {
                w.ser().set_bit().snb().bits(sector).psize().bits(0b10)
            });
            flash.cr.modify(|_, w| w.strt().set_bit());
            Self::wait_and_check().map_err(|_| FlashError::Erase)?;
            flash.cr.modify(|_, w| w.ser().clear_bit());
        }
        Ok(())
    }

    fn program_byte(&mut self, addr: u32, value: u8) -> Result<(), FlashError> {
        let flash = Self::regs();
        flash.cr.modify(|_, w| unsafe { w.pg().set_bit().psize().bits(0b00) });
        unsafe { core::ptr::write_volatile(addr as *mut u8, value) };
        let result = Self::wait_and_check();
        flash.cr.modify(|_, w| w.pg().clear_bit());
        result.map_err(|_| FlashError::Program { offset: addr - APP_BASE })
    }

    fn lock(&mut self) -> Result<(), FlashError> {
        Self::regs().cr.modify(|_, w| w.lock().set_bit());
        Ok(())
    }
}
