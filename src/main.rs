#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

//! Entry point. On-target this is the whole firmware image: bring up the
//! clock, construct the concrete transport and flash adapters, then loop
//! calling `run_session` forever, exactly as §2.1 describes. There is no
//! CLI and no persisted state beyond the flash write itself.

#[macro_use]
mod debug;
mod config;
mod cpu;
mod crc;
mod error;
mod flash;
mod frame;
mod response;
mod session;
mod transport;

#[cfg(target_os = "none")]
use cortex_m_rt::entry;

#[cfg(target_os = "none")]
#[entry]
fn main() -> ! {
    cpu::init();
    debug::init();

    let mut transport = transport::UartTransport::new();
    let mut flash = flash::Stm32F4Flash::new();

    loop {
        match session::run_session(&mut transport, &mut flash) {
            Ok(()) => dbgln!("update session completed"),
            Err(e) => dbgln!("update session ended: {e}"),
        }
        cpu::wfe();
    }
}

// Host builds exist only to run the unit tests in each module; there is no
// meaningful `main` to run off-target.
#[cfg(not(target_os = "none"))]
fn main() {}
