//! Stage 4: Handoff
//!
//! Walks the handoff list and releases every CPU other than the boot core:
//! power up, program the entry point, release from reset. The boot core's own
//! entry is remembered and becomes the exit address once all others run.
//!
//! # Early Handoff
//!
//! R5 targets usually run real-time code with tight start-up budgets. With
//! early handoff enabled they are released as soon as their last partition is
//! loaded instead of after the whole image. Stage 3 asks
//! [`check_early_handoff`] after each partition; an early pass releases one
//! R5 and returns to loading. The final pass releases everything else.

use thiserror_no_std::Error;

use super::{
    BootMode, BootOutcome, ERROR_STATUS_REGISTER, FSBL_COMPLETED, FsblInstance, HandoffValues,
};
use crate::FsblResult;
use crate::boot::init::mark_rpu_in_use;
use crate::cpu::power::PowerAction;
use crate::cpu::vector::set_entry_point;
use crate::cpu::{CpuId, ExecState};
use crate::debug_print;
use crate::image::BootDevice;
use crate::platform::Platform;
use crate::platform::zynqmp::pmu_global;

/// Handoff failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// The boot core cannot switch execution state on its own handoff
    #[error("boot core running {running:?} cannot enter a {requested:?} application")]
    UnsupportedExecState {
        /// State the boot loader runs in
        running: ExecState,
        /// State the application was built for
        requested: ExecState,
    },
}

impl HandoffError {
    /// Numeric status code
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::UnsupportedExecState { .. } => 0x40,
        }
    }
}

/// Where the stage machine goes after a handoff pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStatus {
    /// Early pass done, partitions remain
    ContinuePartitionLoad,
    /// Early pass done after the last partition, run the final pass
    ContinueOtherHandoff,
    /// Final pass done
    Done(BootOutcome),
}

/// Whether `cpu` is released early rather than in the final pass
#[must_use]
pub fn needs_early_handoff(instance: &FsblInstance, cpu: CpuId) -> bool {
    instance.config.early_handoff && cpu.is_r5() && cpu != instance.processor
}

/// Whether partition `index` is the last one of a CPU released early
#[must_use]
pub fn check_early_handoff(instance: &FsblInstance, index: usize) -> bool {
    let running = instance.processor;
    let resolve = |index: usize| {
        instance
            .partitions
            .get(index)
            .and_then(|header| header.resolved_cpu(running))
    };

    let Some(cpu) = resolve(index) else {
        return false;
    };
    needs_early_handoff(instance, cpu) && resolve(index + 1) != Some(cpu)
}

/// Run one handoff pass.
///
/// `partition_num` is the last partition loaded; `early` selects the early
/// pass.
pub fn handoff<P, D>(
    platform: &mut P,
    device: &mut D,
    instance: &mut FsblInstance,
    partition_num: usize,
    early: bool,
) -> FsblResult<HandoffStatus>
where
    P: Platform + ?Sized,
    D: BootDevice + ?Sized,
{
    if instance.boot_mode == Some(BootMode::Jtag) {
        platform.write32(ERROR_STATUS_REGISTER, FSBL_COMPLETED);
        debug_print!(INFO, "JTAG boot, exit without handoff");
        return Ok(HandoffStatus::Done(BootOutcome::Idle));
    }

    if !early {
        let atf = platform.publish_atf_params(&instance.atf);
        platform.write32(pmu_global::GLOB_GEN_STORAGE6, atf);
        device.release()?;
    }

    platform.dcache_disable();

    let mut running_entry = None;
    let mut index = if early { instance.early_cursor } else { 0 };

    while let Some(entry) = instance.handoff.get(index).copied() {
        index += 1;
        if early {
            instance.early_cursor = index;
        }

        let cpu = entry.settings.cpu;
        let needs_early = needs_early_handoff(instance, cpu);
        if needs_early != early {
            continue;
        }

        if cpu == instance.processor {
            check_exec_state(instance, &entry)?;
            running_entry = Some(entry);
        } else {
            release_cpu(platform, instance, &entry)?;
        }

        if early {
            return Ok(continue_loading(platform, instance, partition_num));
        }
    }

    if early {
        debug_print!(WARN, "early handoff found nothing to release");
        return Ok(continue_loading(platform, instance, partition_num));
    }

    platform.write32(ERROR_STATUS_REGISTER, FSBL_COMPLETED);

    let outcome = match running_entry {
        Some(entry) => {
            debug_print!(
                INFO,
                "exit to {:#x} ({:?})",
                entry.address,
                entry.settings.exec_state
            );
            BootOutcome::Exit {
                address: entry.address,
                exec_state: entry.settings.exec_state,
            }
        }
        None => {
            debug_print!(INFO, "no application for the boot core");
            BootOutcome::Idle
        }
    };
    Ok(HandoffStatus::Done(outcome))
}

fn continue_loading<P: Platform + ?Sized>(
    platform: &mut P,
    instance: &FsblInstance,
    partition_num: usize,
) -> HandoffStatus {
    platform.dcache_enable();
    if partition_num + 1 < instance.partition_count() {
        HandoffStatus::ContinuePartitionLoad
    } else {
        HandoffStatus::ContinueOtherHandoff
    }
}

/// The boot core keeps its execution state; only an A53 has a choice
fn check_exec_state(instance: &FsblInstance, entry: &HandoffValues) -> Result<(), HandoffError> {
    let requested = entry.settings.exec_state;
    if instance.processor.is_a53() && requested != instance.exec_state {
        debug_print!(ERROR, "unsupported handoff {:?} -> {:?}", instance.exec_state, requested);
        return Err(HandoffError::UnsupportedExecState {
            running: instance.exec_state,
            requested,
        });
    }
    Ok(())
}

/// Power up, point and release a CPU other than the boot core
fn release_cpu<P: Platform + ?Sized>(
    platform: &mut P,
    instance: &mut FsblInstance,
    entry: &HandoffValues,
) -> FsblResult<()> {
    let settings = entry.settings;

    instance
        .power
        .power_and_reset_cpu(platform, settings, PowerAction::PowerUp)?;
    set_entry_point(platform, entry.address, settings, settings.vector);
    mark_rpu_in_use(platform, settings.cpu);

    debug_print!(
        INFO,
        "{:?} reset release, {:?}, handoff address {:#x}",
        settings.cpu,
        settings.exec_state,
        entry.address
    );
    instance
        .power
        .power_and_reset_cpu(platform, settings, PowerAction::SoftReset)?;
    Ok(())
}
