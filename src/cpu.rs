//! Board/clock bring-up and the handful of CPU primitives the rest of the
//! crate leans on (`CPU_FREQ` for cycle-counted timeouts, `barrier`/`nothing`
//! for busy-waits). Simplified relative to the teacher's PLL bring-up: this
//! target runs off the STM32F411's internal 16 MHz oscillator rather than
//! computing PLL dividers at compile time, since clock configuration itself
//! is out of scope (§1) and only its frequency matters to the rest of the
//! crate.

/// Core clock frequency in Hz. The STM32F411 Nucleo board this crate targets
/// runs from HSI with no PLL multiplication, matching the reference
/// implementation's default clock tree.
pub const CPU_FREQ: u32 = 16_000_000;

/// Full memory barrier, used the same way the teacher's `cpu::barrier()` is:
/// around the startup data/bss copy and before entering the main loop.
#[cfg(target_os = "none")]
pub fn barrier() {
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

#[cfg(not(target_os = "none"))]
pub fn barrier() {}

/// One cycle of useful-nothing, used by the transport adapter's busy-wait
/// timeout loop.
#[cfg(target_os = "none")]
pub fn nothing() {
    cortex_m::asm::nop();
}

#[cfg(not(target_os = "none"))]
pub fn nothing() {}

/// Wait for an event (or interrupt); used by `main`'s idle loop between
/// update sessions.
#[cfg(target_os = "none")]
pub fn wfe() {
    cortex_m::asm::wfe();
}

#[cfg(not(target_os = "none"))]
pub fn wfe() {}

/// Bring up the core clock and any peripherals every board variant needs
/// regardless of which update path it takes. On this target HSI is already
/// the reset default, so there's nothing to program; the function exists so
/// `main` has one bring-up call site to make regardless of board revision,
/// matching the shape of the teacher's own `cpu::init`.
#[cfg(target_os = "none")]
pub fn init() {
    barrier();
}
