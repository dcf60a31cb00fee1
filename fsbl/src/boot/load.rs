//! Stage 3: Partition Load
//!
//! One partition per call, in image order:
//!
//! 1. header checksum
//! 2. owner: partitions for a later stage are left alone
//! 3. header validation
//! 4. copy to the load address (TCM remapped and powered, PMU asleep)
//! 5. handoff list update
//! 6. PMU firmware start after the last PMU partition

use super::{FsblInstance, HandoffValues, ResetReason};
use crate::FsblResult;
use crate::cpu::power::{CpuPowerState, PowerError};
use crate::cpu::{CpuId, CpuSettings, DeviceId};
use crate::debug_print;
use crate::image::address::remap_tcm;
use crate::image::partition::{PartitionHeader, PartitionOwner};
use crate::image::validate::{
    PartitionError, PartitionVerdict, ValidationPolicy, validate_partition_header,
};
use crate::image::{BootDevice, IoError, word_offset};
use crate::platform::zynqmp::pmu_global;
use crate::platform::{Platform, poll_register};

/// What happened to a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Copied (or registered for execute-in-place)
    Loaded,
    /// Owned by a later boot stage
    NotOwned,
    /// Not for this reset scope
    Skipped,
}

/// Load partition `index` of the image
pub fn partition_load<P, D>(
    platform: &mut P,
    device: &mut D,
    instance: &mut FsblInstance,
    index: usize,
) -> FsblResult<LoadStatus>
where
    P: Platform + ?Sized,
    D: BootDevice + ?Sized,
{
    let header = *instance
        .partitions
        .get(index)
        .ok_or(IoError::OutOfBounds { offset: index as u32, len: 0 })?;

    header
        .validate_checksum()
        .map_err(PartitionError::HeaderChecksum)?;

    if header.attributes.owner() != PartitionOwner::Fsbl {
        debug_print!(INFO, "partition {} owned by a later stage, skipped", index);
        return Ok(LoadStatus::NotOwned);
    }

    let policy = ValidationPolicy {
        memory_map: &instance.config.memory_map,
        encryption_required: instance.encryption_required,
    };
    let verdict = validate_partition_header(
        &header,
        instance.processor,
        instance.reset_reason,
        &policy,
    )?;
    if verdict == PartitionVerdict::Skip {
        debug_print!(INFO, "partition {} not reloaded on an APU-only reset", index);
        return Ok(LoadStatus::Skipped);
    }

    let cpu = header.resolved_cpu(instance.processor).unwrap_or(CpuId::None);
    let device_id = header.attributes.destination_device().unwrap_or(DeviceId::None);

    if !copy_partition(platform, device, instance, &header, cpu, device_id)? {
        return Ok(LoadStatus::Skipped);
    }

    if device_id != DeviceId::Pl && !matches!(cpu, CpuId::None | CpuId::Pmu) {
        record_handoff(instance, &header, cpu);
    }

    check_pmu_firmware(platform, instance, index, cpu)?;
    Ok(LoadStatus::Loaded)
}

/// Copy the payload. Returns `false` when the partition is not used in
/// this reset scope.
fn copy_partition<P, D>(
    platform: &mut P,
    device: &mut D,
    instance: &mut FsblInstance,
    header: &PartitionHeader,
    cpu: CpuId,
    device_id: DeviceId,
) -> FsblResult<bool>
where
    P: Platform + ?Sized,
    D: BootDevice + ?Sized,
{
    if header.is_xip() {
        debug_print!(INFO, "execute-in-place at {:#x}", header.exec_address);
        return Ok(true);
    }

    let map = instance.config.memory_map;
    let src = word_offset(instance.image_offset, header.data_offset)?;
    let length = header.total_len.checked_mul(4).ok_or(IoError::OutOfBounds {
        offset: src,
        len: usize::MAX,
    })?;

    if device_id == DeviceId::Pl {
        if instance.reset_reason == ResetReason::PsOnly {
            debug_print!(INFO, "PL partition skipped on a PS-only reset");
            return Ok(false);
        }
        if header.load_address == map.pl_sentinel {
            debug_print!(INFO, "bitstream without staging address not copied");
            return Ok(true);
        }
    }

    let mut load_address = header.load_address;
    if cpu.is_r5() {
        load_address = remap_tcm(&map, cpu, header.load_address, length).ok_or(
            PartitionError::TcmOverflow {
                address: header.load_address,
                length,
            },
        )?;

        let in_tcm = load_address != header.load_address;
        if in_tcm
            && cpu != instance.processor
            && instance.power.state(cpu) < CpuPowerState::ResetAsserted
        {
            instance.power.power_up_tcm(platform, cpu)?;
        }
    }

    if cpu == CpuId::Pmu {
        wait_for_pmu_sleep(platform, instance.config.poll_budget)?;
    }

    debug_print!(
        INFO,
        "copy {:#x} bytes from {:#x} to {:#x}",
        length,
        src,
        load_address
    );
    device.load(src, load_address, length)?;
    Ok(true)
}

/// Add the first partition of each CPU to the handoff list
fn record_handoff(instance: &mut FsblInstance, header: &PartitionHeader, cpu: CpuId) {
    if instance.handoff.iter().any(|entry| entry.settings.cpu == cpu) {
        return;
    }

    let entry = HandoffValues {
        settings: CpuSettings {
            cpu,
            exec_state: header.attributes.exec_state(),
            vector: header.attributes.vector_location(),
        },
        address: header.exec_address,
    };
    if instance.handoff.push(entry).is_err() {
        debug_print!(WARN, "handoff list full, {:?} not released", cpu);
        return;
    }
    debug_print!(DEBUG, "{:?} hands off to {:#x}", cpu, header.exec_address);
}

fn wait_for_pmu_sleep<P: Platform + ?Sized>(platform: &P, budget: u32) -> FsblResult<()> {
    poll_register(
        platform,
        pmu_global::GLOBAL_CNTRL,
        pmu_global::GLOBAL_CNTRL_MB_SLEEP,
        pmu_global::GLOBAL_CNTRL_MB_SLEEP,
        budget,
    )
    .map(|_| ())
    .map_err(|timeout| {
        debug_print!(ERROR, "PMU never went to sleep");
        PowerError::Timeout {
            mask: timeout.mask,
            pending: timeout.last,
        }
        .into()
    })
}

/// Wake the PMU once the last of a run of PMU partitions is in place
fn check_pmu_firmware<P: Platform + ?Sized>(
    platform: &mut P,
    instance: &FsblInstance,
    index: usize,
    cpu: CpuId,
) -> FsblResult<()> {
    if cpu != CpuId::Pmu {
        return Ok(());
    }
    let next_is_pmu = instance
        .partitions
        .get(index + 1)
        .is_some_and(|next| next.attributes.destination_cpu() == Some(CpuId::Pmu));
    if next_is_pmu {
        return Ok(());
    }

    platform.set_bits(pmu_global::GLOBAL_CNTRL, pmu_global::GLOBAL_CNTRL_WAKE);
    poll_register(
        &*platform,
        pmu_global::GLOBAL_CNTRL,
        pmu_global::GLOBAL_CNTRL_FW_IS_PRESENT,
        pmu_global::GLOBAL_CNTRL_FW_IS_PRESENT,
        instance.config.poll_budget,
    )
    .map_err(|timeout| {
        debug_print!(ERROR, "PMU firmware did not come up");
        PowerError::Timeout {
            mask: timeout.mask,
            pending: timeout.last,
        }
    })?;
    debug_print!(INFO, "PMU firmware running");
    Ok(())
}
