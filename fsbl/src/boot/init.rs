//! Stage 1 and Stage 2
//!
//! Stage 1 finds out who and why: the running CPU, the reset scope and
//! whether the previous attempt died to the watchdog. Stage 2 picks the boot
//! device, locates the image and reads its headers.

use super::{
    BootMode, ERROR_STATUS_REGISTER, FSBL_RUNNING, FsblInstance, InitError, ResetReason,
};
use crate::cpu::{CpuId, ExecState};
use crate::debug_print;
use crate::image::atf::starts_application;
use crate::image::table::{IhtStatus, read_and_validate_iht};
use crate::image::{BootDevice, ImageError, read_iht_offset, read_partition_headers};
use crate::platform::Platform;
use crate::platform::zynqmp::{crl_apb, csu, efuse, pmu_global, rpu};
use crate::{FsblError, FsblResult};

/// Cluster field of the affinity register
pub const CLUSTER_ID_MASK: u64 = 0xF00;
/// Cluster of the A53 cores
pub const A53_CLUSTER: u64 = 0x000;
/// Cluster of the R5 cores
pub const R5_CLUSTER: u64 = 0x100;

/// Watchdog error bits checked on a PMU system reset
pub const WDT_ERROR_MASK: u32 =
    pmu_global::ERROR_STATUS_1_LPD_SWDT | pmu_global::ERROR_STATUS_1_FPD_SWDT;

/// Outcome of stage 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Headers read, partitions ready to load
    Ready,
    /// JTAG boot: nothing to load
    Jtag,
}

/// Stage 1: reset reason, processor and reset validation
pub fn initialize<P: Platform + ?Sized>(
    platform: &mut P,
    instance: &mut FsblInstance,
) -> Result<(), InitError> {
    instance.reset_reason = read_reset_reason(platform);
    debug_print!(INFO, "reset reason {:?}", instance.reset_reason);

    processor_init(platform, instance)?;

    if instance.reset_reason != ResetReason::ApuOnly {
        validate_reset(platform)?;
    }

    debug_print!(INFO, "processor initialization done");
    Ok(())
}

/// Decode the reset scope. The PS-only flag is sticky and gets cleared.
pub fn read_reset_reason<P: Platform + ?Sized>(platform: &mut P) -> ResetReason {
    if platform.read32(crl_apb::RESET_REASON) & crl_apb::RESET_REASON_PSONLY_RESET_REQ != 0 {
        platform.write32(
            crl_apb::RESET_REASON,
            crl_apb::RESET_REASON_PSONLY_RESET_REQ,
        );
        return ResetReason::PsOnly;
    }

    if platform.read32(pmu_global::GLOB_GEN_STORAGE4) & pmu_global::APU_ONLY_RESET != 0 {
        ResetReason::ApuOnly
    } else {
        ResetReason::System
    }
}

/// Identify the running CPU from its cluster id
pub fn processor_init<P: Platform + ?Sized>(
    platform: &mut P,
    instance: &mut FsblInstance,
) -> Result<(), InitError> {
    let cluster_id = platform.cluster_id();

    let processor = match cluster_id & CLUSTER_ID_MASK {
        A53_CLUSTER => {
            instance.exec_state = if platform.is_aarch64() {
                ExecState::Aarch64
            } else {
                ExecState::Aarch32
            };
            debug_print!(INFO, "running on A53-0 ({:?})", instance.exec_state);
            CpuId::A53_0
        }
        R5_CLUSTER => {
            let processor = if platform.read32(rpu::GLBL_CNTL) & rpu::GLBL_CNTL_SLSPLIT == 0 {
                CpuId::R5Lockstep
            } else {
                CpuId::R5_0
            };
            debug_print!(INFO, "running on {:?}", processor);
            mark_rpu_in_use(platform, processor);
            processor
        }
        _ => {
            debug_print!(ERROR, "unsupported cluster id {:#x}", cluster_id);
            return Err(InitError::UnsupportedClusterId(cluster_id));
        }
    };

    instance.processor = processor;
    instance.power.mark_running(processor);
    Ok(())
}

/// Flag R5 cores as in use for the PMU
pub fn mark_rpu_in_use<P: Platform + ?Sized>(platform: &mut P, cpu: CpuId) {
    let mask = match cpu {
        CpuId::R5_0 => pmu_global::R5_0_USAGE,
        CpuId::R5_1 => pmu_global::R5_1_USAGE,
        CpuId::R5Lockstep => pmu_global::R5_0_USAGE | pmu_global::R5_1_USAGE,
        _ => return,
    };
    platform.set_bits(pmu_global::GLOB_GEN_STORAGE4, mask);
}

/// Fail when the previous attempt was cut short by the system watchdog,
/// otherwise mark the boot loader running
pub fn validate_reset<P: Platform + ?Sized>(platform: &mut P) -> Result<(), InitError> {
    let status = platform.read32(ERROR_STATUS_REGISTER);
    let reason = platform.read32(crl_apb::RESET_REASON);

    if reason & crl_apb::RESET_REASON_PMU_SYS_RESET != 0 && status == FSBL_RUNNING {
        let errors = platform.read32(pmu_global::ERROR_STATUS_1);
        if errors & WDT_ERROR_MASK != 0 {
            platform.write32(pmu_global::ERROR_STATUS_1, errors & WDT_ERROR_MASK);
            debug_print!(ERROR, "system watchdog reset during the previous boot");
            return Err(InitError::SystemWdtReset);
        }
    }

    if status != FSBL_RUNNING {
        platform.write32(ERROR_STATUS_REGISTER, FSBL_RUNNING);
    }
    Ok(())
}

/// Decode the boot mode pins
pub fn read_boot_mode<P: Platform + ?Sized>(platform: &P) -> Result<BootMode, InitError> {
    let raw = platform.read32(crl_apb::BOOT_MODE_USER) & crl_apb::BOOT_MODE_MASK;
    BootMode::from_raw(raw).ok_or(InitError::UnsupportedBootMode(raw))
}

/// Stage 2: boot device, image header table and partition headers
pub fn boot_device_init_and_validate<P, D>(
    platform: &mut P,
    device: &mut D,
    instance: &mut FsblInstance,
) -> FsblResult<DeviceStatus>
where
    P: Platform + ?Sized,
    D: BootDevice + ?Sized,
{
    let mode = read_boot_mode(&*platform)?;
    instance.boot_mode = Some(mode);
    debug_print!(INFO, "boot mode {:?}", mode);

    if mode == BootMode::Jtag {
        return Ok(DeviceStatus::Jtag);
    }

    device.init(mode)?;

    let multiboot = platform.read32(csu::MULTI_BOOT);
    instance.image_offset = if mode.is_file_system() {
        0
    } else {
        multiboot.wrapping_mul(instance.config.image_search_offset)
    };
    debug_print!(
        INFO,
        "multiboot {:#x}, image offset {:#x}",
        multiboot,
        instance.image_offset
    );

    let iht_offset = read_iht_offset(device, instance.image_offset)?;
    let (iht, status) = read_and_validate_iht(device, iht_offset)?;
    debug_print!(
        INFO,
        "image header table at {:#x}: {} partitions",
        iht_offset,
        iht.partition_count
    );

    instance.partitions = read_partition_headers(device, instance.image_offset, &iht)?;
    instance.iht = Some(iht);

    if let IhtStatus::SecondaryBootDevice(secondary) = status {
        debug_print!(INFO, "partitions on secondary device {:?}", secondary);
        device.select_secondary(secondary).map_err(|err| {
            debug_print!(ERROR, "secondary device {:?}: {}", secondary, err);
            FsblError::Image(ImageError::UnsupportedSecondaryDevice(secondary))
        })?;
    }

    instance.encryption_required = instance.config.force_encryption
        && platform.read32(efuse::SEC_CTRL) & efuse::SEC_CTRL_ENC_ONLY != 0;

    collect_atf_entries(instance);
    Ok(DeviceStatus::Ready)
}

/// List the A53 applications of the image for the trusted firmware.
/// Partition 0 is the boot loader itself.
fn collect_atf_entries(instance: &mut FsblInstance) {
    let mut previous = None;
    for header in instance.partitions.iter().skip(1) {
        if starts_application(header, previous) && !instance.atf.add_partition(header) {
            debug_print!(DEBUG, "no ATF entry for partition at {:#x}", header.exec_address);
        }
        previous = Some(header);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsblConfig;
    use crate::platform::sim::SimPlatform;

    fn instance() -> FsblInstance {
        FsblInstance::new(FsblConfig::default())
    }

    #[test]
    fn ps_only_reset_is_cleared() {
        let mut sim = SimPlatform::new();
        sim.preset(crl_apb::RESET_REASON, crl_apb::RESET_REASON_PSONLY_RESET_REQ | 0x1);
        assert_eq!(read_reset_reason(&mut sim), ResetReason::PsOnly);
        assert_eq!(
            sim.writes(),
            &[(crl_apb::RESET_REASON, crl_apb::RESET_REASON_PSONLY_RESET_REQ)]
        );
    }

    #[test]
    fn apu_only_flag_selects_apu_only_reset() {
        let mut sim = SimPlatform::new();
        sim.preset(pmu_global::GLOB_GEN_STORAGE4, pmu_global::APU_ONLY_RESET);
        assert_eq!(read_reset_reason(&mut sim), ResetReason::ApuOnly);
        let mut sim = SimPlatform::new();
        assert_eq!(read_reset_reason(&mut sim), ResetReason::System);
    }

    #[test]
    fn a53_cluster() {
        let mut sim = SimPlatform::new().with_aarch64(false);
        let mut fsbl = instance();
        processor_init(&mut sim, &mut fsbl).unwrap();
        assert_eq!(fsbl.processor(), CpuId::A53_0);
        assert_eq!(fsbl.exec_state(), ExecState::Aarch32);
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn r5_cluster_split_and_lockstep() {
        let mut sim = SimPlatform::new().with_cluster_id(0xC000_0100);
        sim.preset(rpu::GLBL_CNTL, rpu::GLBL_CNTL_SLSPLIT);
        let mut fsbl = instance();
        processor_init(&mut sim, &mut fsbl).unwrap();
        assert_eq!(fsbl.processor(), CpuId::R5_0);
        assert_eq!(sim.read32(pmu_global::GLOB_GEN_STORAGE4), pmu_global::R5_0_USAGE);

        let mut sim = SimPlatform::new().with_cluster_id(0xC000_0100);
        let mut fsbl = instance();
        processor_init(&mut sim, &mut fsbl).unwrap();
        assert_eq!(fsbl.processor(), CpuId::R5Lockstep);
        assert_eq!(sim.read32(pmu_global::GLOB_GEN_STORAGE4), 0x6);
    }

    #[test]
    fn unknown_cluster_is_rejected() {
        let mut sim = SimPlatform::new().with_cluster_id(0x200);
        assert_eq!(
            processor_init(&mut sim, &mut instance()),
            Err(InitError::UnsupportedClusterId(0x200))
        );
    }

    #[test]
    fn watchdog_reset_while_running_fails() {
        let mut sim = SimPlatform::new();
        sim.preset(ERROR_STATUS_REGISTER, FSBL_RUNNING);
        sim.preset(crl_apb::RESET_REASON, crl_apb::RESET_REASON_PMU_SYS_RESET);
        sim.preset(pmu_global::ERROR_STATUS_1, pmu_global::ERROR_STATUS_1_LPD_SWDT);
        assert_eq!(validate_reset(&mut sim), Err(InitError::SystemWdtReset));
        assert_eq!(
            sim.writes(),
            &[(pmu_global::ERROR_STATUS_1, pmu_global::ERROR_STATUS_1_LPD_SWDT)]
        );
    }

    #[test]
    fn clean_reset_marks_running() {
        let mut sim = SimPlatform::new();
        sim.preset(crl_apb::RESET_REASON, crl_apb::RESET_REASON_PMU_SYS_RESET);
        assert_eq!(validate_reset(&mut sim), Ok(()));
        assert_eq!(sim.read32(ERROR_STATUS_REGISTER), FSBL_RUNNING);
    }

    #[test]
    fn boot_mode_pins() {
        let mut sim = SimPlatform::new();
        sim.preset(crl_apb::BOOT_MODE_USER, 0x1 | 0x100);
        assert_eq!(read_boot_mode(&sim), Ok(BootMode::Qspi24));
        sim.preset(crl_apb::BOOT_MODE_USER, 0x9);
        assert_eq!(read_boot_mode(&sim), Err(InitError::UnsupportedBootMode(0x9)));
    }
}
