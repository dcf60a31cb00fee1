//! Error Lock-Down and Fallback
//!
//! Every failed boot attempt ends here. The final status code goes to the
//! error status register, then the attempt either restarts from the next
//! multiboot image (raw flash and SD style devices) or halts.

use super::{BootMode, BootOutcome, ERROR_STATUS_REGISTER};
use crate::config::FsblConfig;
use crate::debug_print;
use crate::platform::Platform;
use crate::platform::zynqmp::{crl_apb, csu};

/// Record `status` and pick the way out of a failed boot
pub fn lock_down<P: Platform + ?Sized>(
    platform: &mut P,
    status: u32,
    config: &FsblConfig,
) -> BootOutcome {
    platform.write32(ERROR_STATUS_REGISTER, status);

    let raw = platform.read32(crl_apb::BOOT_MODE_USER) & crl_apb::BOOT_MODE_MASK;
    let fallback = BootMode::from_raw(raw).is_some_and(BootMode::supports_fallback);
    if !fallback {
        debug_print!(ERROR, "boot failed with status {:#x}, halting", status);
        return BootOutcome::Halt { status };
    }

    let multiboot = platform.read32(csu::MULTI_BOOT);
    if config
        .max_fallback_attempts
        .is_some_and(|cap| multiboot >= cap)
    {
        debug_print!(
            ERROR,
            "status {:#x}, fallback limit reached at multiboot {:#x}",
            status,
            multiboot
        );
        return BootOutcome::Halt { status };
    }

    let next = multiboot.wrapping_add(1);
    debug_print!(
        ERROR,
        "status {:#x}, falling back to multiboot {:#x}",
        status,
        next
    );
    platform.write32(csu::MULTI_BOOT, next);
    platform.set_bits(crl_apb::RESET_CTRL, crl_apb::RESET_CTRL_SOFT_RESET);

    BootOutcome::Restart { multiboot: next }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::SimPlatform;

    fn board(mode: u32, multiboot: u32) -> SimPlatform {
        let mut sim = SimPlatform::new();
        sim.preset(crl_apb::BOOT_MODE_USER, mode);
        sim.preset(csu::MULTI_BOOT, multiboot);
        sim
    }

    #[test]
    fn flash_boot_falls_back_to_next_image() {
        let mut sim = board(0x2, 3);
        let outcome = lock_down(&mut sim, 0x3011, &FsblConfig::default());

        assert_eq!(outcome, BootOutcome::Restart { multiboot: 4 });
        assert_eq!(sim.read32(ERROR_STATUS_REGISTER), 0x3011);
        assert_eq!(sim.read32(csu::MULTI_BOOT), 4);
        assert_eq!(
            sim.read32(crl_apb::RESET_CTRL) & crl_apb::RESET_CTRL_SOFT_RESET,
            crl_apb::RESET_CTRL_SOFT_RESET
        );
    }

    #[test]
    fn jtag_and_usb_halt() {
        for mode in [0x0, 0x7, 0x9] {
            let mut sim = board(mode, 0);
            assert_eq!(
                lock_down(&mut sim, 0x2010, &FsblConfig::default()),
                BootOutcome::Halt { status: 0x2010 }
            );
            assert!(sim.writes_to(csu::MULTI_BOOT).next().is_none());
            assert!(sim.writes_to(crl_apb::RESET_CTRL).next().is_none());
        }
    }

    #[test]
    fn fallback_cap() {
        let config = FsblConfig {
            max_fallback_attempts: Some(2),
            ..FsblConfig::default()
        };

        let mut sim = board(0x6, 1);
        assert_eq!(
            lock_down(&mut sim, 0x3024, &config),
            BootOutcome::Restart { multiboot: 2 }
        );

        let mut sim = board(0x6, 2);
        assert_eq!(
            lock_down(&mut sim, 0x3024, &config),
            BootOutcome::Halt { status: 0x3024 }
        );
        assert_eq!(sim.read32(ERROR_STATUS_REGISTER), 0x3024);
    }
}
