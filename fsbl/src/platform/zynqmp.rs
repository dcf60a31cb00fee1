//! ZynqMP Register Map and MMIO Platform
//!
//! Register addresses and bit masks for the blocks the boot loader drives,
//! grouped per IP block, plus the target [`Platform`] implementation.
//!
//! # Memory Map
//!
//! ```text
//! 0x0000_0000 - 0x7FFF_FFFF : PS DDR (low)
//! 0xC000_0000 - 0xDFFF_FFFF : QSPI linear window
//! 0xFD1A_0000               : CRF_APB (full power domain clock/reset)
//! 0xFD5C_0000               : APU control
//! 0xFF5E_0000               : CRL_APB (low power domain clock/reset)
//! 0xFF9A_0000               : RPU control
//! 0xFFCA_0000               : CSU
//! 0xFFCC_0000               : eFUSE
//! 0xFFD8_0000               : PMU global
//! 0xFFDC_0000 - 0xFFDD_FFFF : PMU RAM
//! 0xFFE0_0000 - 0xFFEB_FFFF : R5 TCM global aliases
//! 0xFFFC_0000 - 0xFFFF_FFFF : OCM
//! 0x8_0000_0000 -           : PS DDR (high)
//! ```

#![warn(clippy::undocumented_unsafe_blocks)]

use bitflags::bitflags;

use super::Platform;
use crate::arch::{self, cache};
use crate::image::atf::AtfHandoffParams;

/// Low power domain clock and reset controller
pub mod crl_apb {
    /// Block base address
    pub const BASE: u32 = 0xFF5E_0000;
    /// R5 clock control
    pub const CPU_R5_CTRL: u32 = BASE + 0x90;
    /// R5 clock active
    pub const CPU_R5_CTRL_CLKACT: u32 = 0x0100_0000;
    /// Boot mode pins as seen by software
    pub const BOOT_MODE_USER: u32 = BASE + 0x200;
    /// Boot mode field
    pub const BOOT_MODE_MASK: u32 = 0xF;
    /// System reset control
    pub const RESET_CTRL: u32 = BASE + 0x218;
    /// Soft reset request bit
    pub const RESET_CTRL_SOFT_RESET: u32 = 0x10;
    /// Reason of the last reset
    pub const RESET_REASON: u32 = BASE + 0x220;
    /// Reset issued by the PMU (watchdog, error escalation)
    pub const RESET_REASON_PMU_SYS_RESET: u32 = 0x4;
    /// PS-only reset, sticky until written back
    pub const RESET_REASON_PSONLY_RESET_REQ: u32 = 0x8;
    /// Low power domain reset control
    pub const RST_LPD_TOP: u32 = BASE + 0x23C;
    /// R5-0 core reset
    pub const RST_LPD_TOP_RPU_R50: u32 = 0x1;
    /// R5-1 core reset
    pub const RST_LPD_TOP_RPU_R51: u32 = 0x2;
    /// RPU AMBA interconnect reset
    pub const RST_LPD_TOP_RPU_AMBA: u32 = 0x4;
}

/// Full power domain clock and reset controller
pub mod crf_apb {
    /// Block base address
    pub const BASE: u32 = 0xFD1A_0000;
    /// APU clock control
    pub const ACPU_CTRL: u32 = BASE + 0x60;
    /// Full speed clock active
    pub const ACPU_CTRL_CLKACT_FULL: u32 = 0x0100_0000;
    /// Half speed clock active
    pub const ACPU_CTRL_CLKACT_HALF: u32 = 0x0200_0000;
    /// APU reset control
    pub const RST_FPD_APU: u32 = BASE + 0x104;
    /// Shared L2 reset
    pub const RST_FPD_APU_L2: u32 = 0x100;

    /// Core reset bit of A53 core `n`
    #[must_use]
    pub const fn acpu_reset(n: u32) -> u32 {
        0x1 << n
    }

    /// Power-on reset bit of A53 core `n`
    #[must_use]
    pub const fn acpu_pwron_reset(n: u32) -> u32 {
        0x400 << n
    }
}

/// APU configuration block
pub mod apu {
    /// Block base address
    pub const BASE: u32 = 0xFD5C_0000;
    /// Execution state and vector selection for all four cores
    pub const CONFIG_0: u32 = BASE + 0x20;

    /// `AA64nAA32` bit of core `n`: set for AArch64
    #[must_use]
    pub const fn aa64n32(n: u32) -> u32 {
        0x1 << n
    }

    /// `VINITHI` shift of core `n`
    #[must_use]
    pub const fn vinithi_shift(n: u32) -> u32 {
        8 + n
    }

    /// Low word of the AArch64 reset vector of core `n`
    #[must_use]
    pub const fn rvbar_low(n: u32) -> u32 {
        BASE + 0x40 + 8 * n
    }

    /// High word of the AArch64 reset vector of core `n`
    #[must_use]
    pub const fn rvbar_high(n: u32) -> u32 {
        BASE + 0x44 + 8 * n
    }
}

/// RPU configuration block
pub mod rpu {
    /// Block base address
    pub const BASE: u32 = 0xFF9A_0000;
    /// Global RPU control
    pub const GLBL_CNTL: u32 = BASE;
    /// Split (non-lockstep) mode
    pub const GLBL_CNTL_SLSPLIT: u32 = 0x8;
    /// Lockstep clamp
    pub const GLBL_CNTL_SLCLAMP: u32 = 0x10;
    /// Combined TCM (lockstep)
    pub const GLBL_CNTL_TCM_COMB: u32 = 0x40;
    /// R5-0 configuration
    pub const RPU_0_CFG: u32 = BASE + 0x100;
    /// R5-1 configuration
    pub const RPU_1_CFG: u32 = BASE + 0x200;
    /// Core runs when set, halted when clear
    pub const CFG_NCPUHALT: u32 = 0x1;
    /// High vector select
    pub const CFG_VINITHI: u32 = 0x4;
    /// Shift of the high vector select bit
    pub const CFG_VINITHI_SHIFT: u32 = 2;
}

/// PMU global registers
pub mod pmu_global {
    /// Block base address
    pub const BASE: u32 = 0xFFD8_0000;
    /// PMU MicroBlaze control
    pub const GLOBAL_CNTRL: u32 = BASE;
    /// Wake the PMU processor
    pub const GLOBAL_CNTRL_WAKE: u32 = 0x1;
    /// PMU firmware reports itself running
    pub const GLOBAL_CNTRL_FW_IS_PRESENT: u32 = 0x10;
    /// PMU processor sleeping
    pub const GLOBAL_CNTRL_MB_SLEEP: u32 = 0x1_0000;
    /// General storage, R5 usage and APU-only reset flags
    pub const GLOB_GEN_STORAGE4: u32 = BASE + 0x40;
    /// General storage, boot loader encryption status
    pub const GLOB_GEN_STORAGE5: u32 = BASE + 0x44;
    /// General storage, ATF handoff parameter address
    pub const GLOB_GEN_STORAGE6: u32 = BASE + 0x48;
    /// Persistent storage holding the boot loader status
    pub const PERS_GLOB_GEN_STORAGE4: u32 = BASE + 0x60;
    /// Power state of every island
    pub const PWR_STATE: u32 = BASE + 0x100;
    /// Pending power up requests
    pub const REQ_PWRUP_STATUS: u32 = BASE + 0x110;
    /// Power up request enable
    pub const REQ_PWRUP_INT_EN: u32 = BASE + 0x118;
    /// Power up request trigger
    pub const REQ_PWRUP_TRIG: u32 = BASE + 0x120;
    /// Error status 1
    pub const ERROR_STATUS_1: u32 = BASE + 0x530;
    /// LPD system watchdog error
    pub const ERROR_STATUS_1_LPD_SWDT: u32 = 0x1000;
    /// FPD system watchdog error
    pub const ERROR_STATUS_1_FPD_SWDT: u32 = 0x2000;

    /// R5-0 in use, in `GLOB_GEN_STORAGE4`
    pub const R5_0_USAGE: u32 = 0x2;
    /// R5-1 in use, in `GLOB_GEN_STORAGE4`
    pub const R5_1_USAGE: u32 = 0x4;
    /// Last reset was an APU-only reset, in `GLOB_GEN_STORAGE4`
    pub const APU_ONLY_RESET: u32 = 0x1_0000;
}

/// Configuration security unit
pub mod csu {
    /// Block base address
    pub const BASE: u32 = 0xFFCA_0000;
    /// Multiboot image index
    pub const MULTI_BOOT: u32 = BASE + 0x10;
}

/// eFUSE controller
pub mod efuse {
    /// Block base address
    pub const BASE: u32 = 0xFFCC_0000;
    /// IP disable fuses
    pub const IPDISABLE: u32 = BASE + 0x1018;
    /// APU core 2 disabled
    pub const IPDISABLE_APU2_DIS: u32 = 0x4;
    /// APU core 3 disabled
    pub const IPDISABLE_APU3_DIS: u32 = 0x8;
    /// GPU disabled
    pub const IPDISABLE_GPU_DIS: u32 = 0x20;
    /// Fuse pattern of the dual-core CG silicon
    pub const IPDISABLE_CG: u32 = IPDISABLE_GPU_DIS | IPDISABLE_APU2_DIS | IPDISABLE_APU3_DIS;
    /// Security control fuses
    pub const SEC_CTRL: u32 = BASE + 0x1058;
    /// Only encrypted images may boot
    pub const SEC_CTRL_ENC_ONLY: u32 = 0x4;
}

bitflags! {
    /// Power islands controlled through the PMU power up request registers
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PowerIsland: u32 {
        /// A53 core 0
        const ACPU0 = 0x1;
        /// A53 core 1
        const ACPU1 = 0x2;
        /// A53 core 2
        const ACPU2 = 0x4;
        /// A53 core 3
        const ACPU3 = 0x8;
        /// Shared L2 bank 0
        const L2_BANK0 = 0x80;
        /// R5 island, shared by both R5 cores
        const R5_0 = 0x400;
        /// R5-1 request bit, folded into the R5 island
        const R5_1 = 0x800;
        /// TCM bank 0A
        const TCM0A = 0x1000;
        /// TCM bank 0B
        const TCM0B = 0x2000;
        /// TCM bank 1A
        const TCM1A = 0x4000;
        /// TCM bank 1B
        const TCM1B = 0x8000;
        /// Full power domain
        const FP = 0x0040_0000;
    }
}

impl PowerIsland {
    /// Request mask as written to the PMU.
    ///
    /// There is a single island for both R5 cores, so an R5-1 request is
    /// issued against the R5-0 bit.
    #[must_use]
    pub fn request_mask(self) -> u32 {
        let mut island = self;
        if island.contains(Self::R5_1) {
            island.remove(Self::R5_1);
            island.insert(Self::R5_0);
        }
        island.bits()
    }
}

/// Debug UART used by the target logger
pub const UART0_BASE: u32 = 0xFF00_0000;

/// Target platform: volatile MMIO plus core-local cache and id registers
pub struct ZynqMpPlatform {
    /// Placed storage for the ATF handoff parameters
    atf_slot: &'static mut AtfHandoffParams,
}

impl ZynqMpPlatform {
    /// Create the target platform around the placed ATF parameter storage
    pub fn new(atf_slot: &'static mut AtfHandoffParams) -> Self {
        Self { atf_slot }
    }
}

impl Platform for ZynqMpPlatform {
    fn read32(&self, addr: u32) -> u32 {
        // SAFETY: every address the boot flow passes in comes from the
        // register map above and is a valid, aligned 32-bit device register.
        unsafe { arch::mmio_read(addr) }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        // SAFETY: see `read32`; writes are issued from the single boot core.
        unsafe { arch::mmio_write(addr, value) }
    }

    fn delay_us(&mut self, us: u32) {
        arch::spin_delay_us(us);
    }

    fn cluster_id(&self) -> u64 {
        arch::read_mpidr()
    }

    fn is_aarch64(&self) -> bool {
        cfg!(target_arch = "aarch64")
    }

    fn dcache_enable(&mut self) {
        cache::dcache_enable();
    }

    fn dcache_disable(&mut self) {
        cache::dcache_clean_invalidate_all();
        cache::dcache_disable();
    }

    fn publish_atf_params(&mut self, params: &AtfHandoffParams) -> u32 {
        *self.atf_slot = *params;
        core::ptr::from_ref::<AtfHandoffParams>(self.atf_slot) as usize as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r5_1_requests_fold_into_shared_island() {
        assert_eq!(PowerIsland::R5_1.request_mask(), PowerIsland::R5_0.bits());
        let tcm = PowerIsland::R5_1 | PowerIsland::TCM1A | PowerIsland::TCM1B;
        assert_eq!(tcm.request_mask(), 0x400 | 0x4000 | 0x8000);
    }

    #[test]
    fn per_core_register_helpers() {
        assert_eq!(apu::rvbar_low(0), 0xFD5C_0040);
        assert_eq!(apu::rvbar_high(3), 0xFD5C_005C);
        assert_eq!(crf_apb::acpu_pwron_reset(2), 0x1000);
        assert_eq!(apu::vinithi_shift(1), 9);
    }
}
