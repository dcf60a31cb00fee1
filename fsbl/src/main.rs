//! Zero FSBL - First Stage Boot Loader
//!
//! Target entry point. The startup code sets up the stack on the boot core
//! and calls [`fsbl_main`], which runs one boot attempt from the QSPI linear
//! window and never returns.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

use core::cell::UnsafeCell;

use fsbl::arch::{self, uart::UartLogger};
use fsbl::debug_print;
use fsbl::image::atf::AtfHandoffParams;
use fsbl::image::linear::{LinearFlash, QSPI_LINEAR_BASE, QSPI_LINEAR_SIZE};
use fsbl::platform::zynqmp::{UART0_BASE, ZynqMpPlatform};
use fsbl::{BootOutcome, Fsbl, FsblConfig};
use log::LevelFilter;

/// Storage for the ATF handoff parameters, placed by the linker script
struct AtfSlot(UnsafeCell<AtfHandoffParams>);

// SAFETY: only the boot core touches the slot, from `fsbl_main`, before any
// other core is released.
unsafe impl Sync for AtfSlot {}

#[unsafe(link_section = ".atf_handoff_params")]
static ATF_HANDOFF_PARAMS: AtfSlot = AtfSlot(UnsafeCell::new(AtfHandoffParams::new()));

static LOGGER: UartLogger = UartLogger::new(UART0_BASE, LevelFilter::Trace);

#[cfg(not(test))]
mod panic_handler {
    use core::panic::PanicInfo;

    #[panic_handler]
    fn panic(info: &PanicInfo<'_>) -> ! {
        fsbl::debug_print!(ERROR, "FSBL PANIC: {}", info);
        fsbl::arch::park()
    }
}

/// Boot loader entry, called once by the startup code on the boot core
#[unsafe(no_mangle)]
pub extern "C" fn fsbl_main() -> ! {
    let config = FsblConfig::default();

    if cfg!(feature = "debug-uart") && LOGGER.install().is_ok() {
        log::set_max_level(config.log_level.level_filter());
    }
    debug_print!(INFO, "Zero FSBL {}", env!("CARGO_PKG_VERSION"));

    // SAFETY: `fsbl_main` runs once and is the only code referencing the slot.
    let atf_slot = unsafe { &mut *ATF_HANDOFF_PARAMS.0.get() };
    let mut platform = ZynqMpPlatform::new(atf_slot);

    // SAFETY: the boot ROM leaves the QSPI linear window mapped and readable;
    // validated load addresses never fall inside it.
    let mut flash =
        unsafe { LinearFlash::new(QSPI_LINEAR_BASE as *const u8, QSPI_LINEAR_SIZE) };

    match Fsbl::new(&mut platform, &mut flash, config).run() {
        BootOutcome::Exit { address, .. } => {
            // SAFETY: the handoff pass validated the address, checked the
            // execution state and left the data cache clean and disabled.
            unsafe { arch::jump_to(address) }
        }
        BootOutcome::Idle => {
            debug_print!(INFO, "boot core idle");
            arch::park()
        }
        BootOutcome::Restart { multiboot } => {
            debug_print!(INFO, "waiting for reset into multiboot {:#x}", multiboot);
            arch::park()
        }
        BootOutcome::Halt { status } => {
            debug_print!(ERROR, "halted, status {:#x}", status);
            arch::park()
        }
    }
}
