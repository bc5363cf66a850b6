//! Diagnostic logging sink (§2.1). Field diagnosis only — the sender never
//! sees these lines. On-target this writes to a dedicated debug UART
//! (USART1, distinct from the update link on USART2); off-target it's
//! `println!`, so the same `dbgln!` call sites work in host-run tests.

#[cfg(target_os = "none")]
pub fn init() {
    let rcc = unsafe { &*stm32f4::stm32f411::RCC::ptr() };
    let gpioa = unsafe { &*stm32f4::stm32f411::GPIOA::ptr() };
    let uart = unsafe { &*stm32f4::stm32f411::USART1::ptr() };

    rcc.apb2enr.modify(|_, w| w.usart1en().set_bit());
    rcc.ahb1enr.modify(|_, w| w.gpioaen().set_bit());

    // PA9 = TX, alternate function 7.
    gpioa.moder.modify(|_, w| w.moder9().alternate());
    gpioa.afrh.modify(|_, w| unsafe { w.afrh9().bits(7) });

    const BAUD: u32 = 115200;
    let brr = (crate::cpu::CPU_FREQ + BAUD / 2) / BAUD;
    uart.brr.write(|w| unsafe { w.bits(brr) });
    uart.cr1.write(|w| w.te().set_bit().ue().set_bit());
}

#[cfg(not(target_os = "none"))]
pub fn init() {}

#[cfg(target_os = "none")]
pub fn write_byte(byte: u8) {
    let uart = unsafe { &*stm32f4::stm32f411::USART1::ptr() };
    while !uart.sr.read().txe().bit() {}
    uart.dr.write(|w| w.dr().bits(byte as u16));
}

#[cfg(target_os = "none")]
pub fn write_str(s: &str) {
    for &b in s.as_bytes() {
        write_byte(b);
    }
}

#[cfg(not(target_os = "none"))]
pub fn write_str(s: &str) {
    print!("{s}");
}

/// Format and emit one debug line. Compiled to a `println!` off-target and
/// to blocking UART writes on-target, mirroring the teacher's `dbgln!`
/// macro but without its interrupt-priority dance — this link has no
/// interrupt handler to contend with.
#[macro_export]
macro_rules! dbgln {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        {
            use core::fmt::Write;
            struct Sink;
            impl core::fmt::Write for Sink {
                fn write_str(&mut self, s: &str) -> core::fmt::Result {
                    $crate::debug::write_str(s);
                    Ok(())
                }
            }
            let _ = writeln!(Sink, $($arg)*);
        }
        #[cfg(not(target_os = "none"))]
        {
            std::println!($($arg)*);
        }
    }};
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    dbgln!("panic: {info}");
    loop {
        crate::cpu::wfe();
    }
}
