//! Boot Stage Machine
//!
//! ```text
//! Stage1  processor, reset reason, reset validation
//! Stage2  boot mode, boot device, image header table, partition headers
//! Stage3  load one partition, then ask for an early handoff
//! Stage4  early pass (one R5, back to Stage3) or final pass (exit)
//! ```
//!
//! A failure in any stage ends in lock-down: the error code plus the stage
//! offset goes to the status register, then fallback or halt.
//!
//! Partition 0 is the boot loader itself and is never loaded; Stage3 starts
//! at partition 1. A JTAG boot skips straight from Stage2 to Stage4.

use super::fallback::lock_down;
use super::handoff::{HandoffStatus, check_early_handoff, handoff};
use super::init::{DeviceStatus, boot_device_init_and_validate, initialize, mark_rpu_in_use};
use super::load::{LoadStatus, partition_load};
use super::{BootOutcome, FsblInstance};
use crate::config::FsblConfig;
use crate::cpu::CpuId;
use crate::debug_print;
use crate::image::BootDevice;
use crate::platform::Platform;
use crate::FsblResult;

/// Boot stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Processor and reset initialization
    Stage1,
    /// Boot device and image headers
    Stage2,
    /// Partition load
    Stage3,
    /// Handoff
    Stage4,
}

impl Stage {
    /// Offset added to error codes raised in this stage
    #[must_use]
    pub const fn error_offset(self) -> u32 {
        match self {
            Self::Stage1 => 0x1000,
            Self::Stage2 => 0x2000,
            Self::Stage3 => 0x3000,
            Self::Stage4 => 0x4000,
        }
    }
}

enum Step {
    Next(Stage),
    Finish(BootOutcome),
}

/// One boot attempt over a platform and a boot device
pub struct Fsbl<'a, P: Platform + ?Sized, D: BootDevice + ?Sized> {
    platform: &'a mut P,
    device: &'a mut D,
    instance: FsblInstance,
    partition_num: usize,
    early_handoff: bool,
}

impl<'a, P: Platform + ?Sized, D: BootDevice + ?Sized> Fsbl<'a, P, D> {
    /// Prepare a boot attempt
    pub fn new(platform: &'a mut P, device: &'a mut D, config: FsblConfig) -> Self {
        Self {
            platform,
            device,
            instance: FsblInstance::new(config),
            partition_num: 0,
            early_handoff: false,
        }
    }

    /// State gathered so far
    #[must_use]
    pub const fn instance(&self) -> &FsblInstance {
        &self.instance
    }

    /// Drive the stages until the attempt exits, idles, restarts or halts
    pub fn run(&mut self) -> BootOutcome {
        let mut stage = Stage::Stage1;
        let (failed, err) = loop {
            debug_print!(DEBUG, "{:?}", stage);
            let step = match stage {
                Stage::Stage1 => self.stage1(),
                Stage::Stage2 => self.stage2(),
                Stage::Stage3 => self.stage3(),
                Stage::Stage4 => self.stage4(),
            };

            match step {
                Ok(Step::Next(next)) => stage = next,
                Ok(Step::Finish(outcome)) => return outcome,
                Err(err) => break (stage, err),
            }
        };

        let status = err.code() + failed.error_offset();
        debug_print!(ERROR, "{:?} failed, status {:#x}: {}", failed, status, err);
        lock_down(&mut *self.platform, status, &self.instance.config)
    }

    fn stage1(&mut self) -> FsblResult<Step> {
        initialize(&mut *self.platform, &mut self.instance)?;
        Ok(Step::Next(Stage::Stage2))
    }

    fn stage2(&mut self) -> FsblResult<Step> {
        let status =
            boot_device_init_and_validate(&mut *self.platform, &mut *self.device, &mut self.instance)?;

        if status == DeviceStatus::Jtag {
            mark_rpu_in_use(&mut *self.platform, CpuId::R5Lockstep);
            self.partition_num = 0;
            return Ok(Step::Next(Stage::Stage4));
        }

        if self.instance.partition_count() > 1 {
            self.partition_num = 1;
            Ok(Step::Next(Stage::Stage3))
        } else {
            debug_print!(WARN, "image holds no partition besides the boot loader");
            Ok(Step::Next(Stage::Stage4))
        }
    }

    fn stage3(&mut self) -> FsblResult<Step> {
        let index = self.partition_num;
        debug_print!(INFO, "partition {} load", index);

        let status = partition_load(
            &mut *self.platform,
            &mut *self.device,
            &mut self.instance,
            index,
        )?;

        self.early_handoff =
            status == LoadStatus::Loaded && check_early_handoff(&self.instance, index);
        if self.early_handoff {
            debug_print!(INFO, "early handoff after partition {}", index);
            return Ok(Step::Next(Stage::Stage4));
        }

        if index + 1 < self.instance.partition_count() {
            self.partition_num = index + 1;
            Ok(Step::Next(Stage::Stage3))
        } else {
            Ok(Step::Next(Stage::Stage4))
        }
    }

    fn stage4(&mut self) -> FsblResult<Step> {
        let status = handoff(
            &mut *self.platform,
            &mut *self.device,
            &mut self.instance,
            self.partition_num,
            self.early_handoff,
        )?;

        Ok(match status {
            HandoffStatus::ContinuePartitionLoad => {
                self.early_handoff = false;
                self.partition_num += 1;
                Step::Next(Stage::Stage3)
            }
            HandoffStatus::ContinueOtherHandoff => {
                self.early_handoff = false;
                Step::Next(Stage::Stage4)
            }
            HandoffStatus::Done(outcome) => Step::Finish(outcome),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::{ERROR_STATUS_REGISTER, FSBL_COMPLETED};
    use crate::image::{ImageSource, IoError};
    use crate::platform::sim::SimPlatform;
    use crate::platform::zynqmp::{crl_apb, csu, pmu_global};

    struct Blank;

    impl ImageSource for Blank {
        fn copy(&mut self, _: u32, dst: &mut [u8]) -> Result<(), IoError> {
            dst.fill(0);
            Ok(())
        }
    }

    impl BootDevice for Blank {
        fn load(&mut self, _: u32, _: u64, _: u32) -> Result<(), IoError> {
            Ok(())
        }
    }

    #[test]
    fn stage_offsets() {
        assert_eq!(Stage::Stage1.error_offset(), 0x1000);
        assert_eq!(Stage::Stage4.error_offset(), 0x4000);
    }

    #[test]
    fn jtag_boot_marks_rpu_and_completes() {
        let mut sim = SimPlatform::new();
        let mut device = Blank;
        let outcome = Fsbl::new(&mut sim, &mut device, FsblConfig::default()).run();

        assert_eq!(outcome, BootOutcome::Idle);
        assert_eq!(sim.read32(ERROR_STATUS_REGISTER), FSBL_COMPLETED);
        assert_eq!(
            sim.read32(pmu_global::GLOB_GEN_STORAGE4),
            pmu_global::R5_0_USAGE | pmu_global::R5_1_USAGE
        );
    }

    #[test]
    fn blank_flash_falls_back_with_stage2_status() {
        let mut sim = SimPlatform::new();
        sim.preset(crl_apb::BOOT_MODE_USER, 0x2);
        let mut device = Blank;
        let outcome = Fsbl::new(&mut sim, &mut device, FsblConfig::default()).run();

        assert_eq!(outcome, BootOutcome::Restart { multiboot: 1 });
        // an all-zero table fails its checksum
        assert_eq!(sim.read32(ERROR_STATUS_REGISTER), 0x2011);
        assert_eq!(sim.read32(csu::MULTI_BOOT), 1);
    }

    #[test]
    fn unknown_cluster_halts_with_stage1_status() {
        let mut sim = SimPlatform::new().with_cluster_id(0x300);
        let mut device = Blank;
        let outcome = Fsbl::new(&mut sim, &mut device, FsblConfig::default()).run();
        assert_eq!(outcome, BootOutcome::Halt { status: 0x1002 });
    }
}
