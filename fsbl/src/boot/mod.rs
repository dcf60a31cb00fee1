//! Boot Flow
//!
//! One boot attempt, from the first instruction to the jump into the loaded
//! applications. [`FsblInstance`] holds everything the stages learn about
//! the system and the image; it is created by [`Fsbl::new`] and threaded by
//! reference through every stage, there is no global boot loader state.
//!
//! # Stages
//!
//! ```text
//! Stage1 --> Stage2 --+--> Stage3 <--+--> Stage4 --> exit
//!   |          |      |      |       |       |
//!   |          |      +------|-------+-------+ (JTAG)
//!   v          v             v               v
//!   +--------> Error <-------+---------------+
//!                |
//!                v
//!           lock down (restart or halt)
//! ```
//!
//! See [`stage`] for the transitions, [`init`] for stages 1 and 2, [`load`]
//! for stage 3, [`handoff`] for stage 4 and [`fallback`] for the error path.

pub mod fallback;
pub mod handoff;
pub mod init;
pub mod load;
pub mod stage;

pub use stage::{Fsbl, Stage};

use heapless::Vec;
use thiserror_no_std::Error;

use crate::config::FsblConfig;
use crate::cpu::power::PowerSequencer;
use crate::cpu::{CpuId, CpuSettings, ExecState};
use crate::image::PartitionHeaders;
use crate::image::atf::AtfHandoffParams;
use crate::image::table::ImageHeaderTable;
use crate::platform::zynqmp::pmu_global;

/// Register the boot status and final error code are written to
pub const ERROR_STATUS_REGISTER: u32 = pmu_global::PERS_GLOB_GEN_STORAGE4;

/// Status register value while the boot loader runs
pub const FSBL_RUNNING: u32 = 0xFFFF;

/// Status register value once every CPU has been handed off
pub const FSBL_COMPLETED: u32 = 0;

/// CPUs that can receive control
pub const MAX_HANDOFF_CPUS: usize = 8;

/// Stage 1 failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitError {
    /// The boot core is neither the A53 nor the R5 cluster
    #[error("unsupported cluster id {0:#x}")]
    UnsupportedClusterId(u64),
    /// Boot mode pins select a device the boot loader cannot read
    #[error("unsupported boot mode {0:#x}")]
    UnsupportedBootMode(u32),
    /// The previous attempt was killed by the system watchdog
    #[error("system watchdog reset during the previous boot")]
    SystemWdtReset,
}

impl InitError {
    /// Numeric status code
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::UnsupportedClusterId(_) => 0x02,
            Self::UnsupportedBootMode(_) => 0x03,
            Self::SystemWdtReset => 0x04,
        }
    }
}

/// Primary boot device selected by the boot mode pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Debugger download, no image to load
    Jtag,
    /// QSPI, 24-bit addressing
    Qspi24,
    /// QSPI, 32-bit addressing
    Qspi32,
    /// SD controller 0
    Sd0,
    /// NAND
    Nand,
    /// SD controller 1
    Sd1,
    /// eMMC
    Emmc,
    /// USB device download
    Usb,
    /// SD controller 1, level shifted
    Sd1Ls,
}

impl BootMode {
    /// Decode the boot mode field
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0x0 => Self::Jtag,
            0x1 => Self::Qspi24,
            0x2 => Self::Qspi32,
            0x3 => Self::Sd0,
            0x4 => Self::Nand,
            0x5 => Self::Sd1,
            0x6 => Self::Emmc,
            0x7 => Self::Usb,
            0xE => Self::Sd1Ls,
            _ => return None,
        })
    }

    /// Devices read through a file system: the image is always at offset 0
    #[must_use]
    pub const fn is_file_system(self) -> bool {
        matches!(
            self,
            Self::Sd0 | Self::Sd1 | Self::Sd1Ls | Self::Emmc | Self::Usb
        )
    }

    /// Devices that may hold further images to fall back to
    #[must_use]
    pub const fn supports_fallback(self) -> bool {
        matches!(
            self,
            Self::Qspi24 | Self::Qspi32 | Self::Nand | Self::Sd0 | Self::Sd1 | Self::Emmc | Self::Sd1Ls
        )
    }
}

/// Scope of the reset that started this boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResetReason {
    /// Power-on or system reset
    #[default]
    System,
    /// Only the processing system was reset, the PL kept its configuration
    PsOnly,
    /// Only the APU was reset; only A53 partitions are reloaded
    ApuOnly,
}

/// A CPU to release and where it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffValues {
    /// Target CPU, execution state and vector location
    pub settings: CpuSettings,
    /// Entry point
    pub address: u64,
}

/// Handoff list, one entry per CPU in partition order
pub type HandoffList = Vec<HandoffValues, MAX_HANDOFF_CPUS>;

/// How a boot attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Jump to `address` on the boot core
    Exit {
        /// Entry point of the boot core's application
        address: u64,
        /// Execution state to enter it in
        exec_state: ExecState,
    },
    /// Every CPU handed off and nothing left for the boot core
    Idle,
    /// Multiboot advanced and a system reset requested
    Restart {
        /// New multiboot value
        multiboot: u32,
    },
    /// Error recorded, no image to fall back to
    Halt {
        /// Status written to the error status register
        status: u32,
    },
}

/// State of one boot attempt
#[derive(Debug, Clone)]
pub struct FsblInstance {
    pub(crate) config: FsblConfig,
    pub(crate) processor: CpuId,
    pub(crate) exec_state: ExecState,
    pub(crate) reset_reason: ResetReason,
    pub(crate) boot_mode: Option<BootMode>,
    pub(crate) image_offset: u32,
    pub(crate) encryption_required: bool,
    pub(crate) iht: Option<ImageHeaderTable>,
    pub(crate) partitions: PartitionHeaders,
    pub(crate) handoff: HandoffList,
    pub(crate) early_cursor: usize,
    pub(crate) power: PowerSequencer,
    pub(crate) atf: AtfHandoffParams,
}

impl FsblInstance {
    /// Fresh state for a boot attempt under `config`
    #[must_use]
    pub fn new(config: FsblConfig) -> Self {
        Self {
            config,
            processor: CpuId::None,
            exec_state: ExecState::default(),
            reset_reason: ResetReason::default(),
            boot_mode: None,
            image_offset: 0,
            encryption_required: false,
            iht: None,
            partitions: PartitionHeaders::new(),
            handoff: HandoffList::new(),
            early_cursor: 0,
            power: PowerSequencer::new(config.poll_budget),
            atf: AtfHandoffParams::new(),
        }
    }

    /// Configuration of this attempt
    #[must_use]
    pub const fn config(&self) -> &FsblConfig {
        &self.config
    }

    /// CPU running the boot loader
    #[must_use]
    pub const fn processor(&self) -> CpuId {
        self.processor
    }

    /// Execution state of the boot loader on an A53
    #[must_use]
    pub const fn exec_state(&self) -> ExecState {
        self.exec_state
    }

    /// Scope of the reset that started this boot
    #[must_use]
    pub const fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    /// Primary boot device, once decoded
    #[must_use]
    pub const fn boot_mode(&self) -> Option<BootMode> {
        self.boot_mode
    }

    /// Byte offset of the image on the boot device
    #[must_use]
    pub const fn image_offset(&self) -> u32 {
        self.image_offset
    }

    /// Validated image header table
    #[must_use]
    pub const fn image_header_table(&self) -> Option<&ImageHeaderTable> {
        self.iht.as_ref()
    }

    /// Partition headers as read from the image
    #[must_use]
    pub fn partitions(&self) -> &[crate::image::partition::PartitionHeader] {
        &self.partitions
    }

    /// CPUs to release, in partition order
    #[must_use]
    pub fn handoff_list(&self) -> &[HandoffValues] {
        &self.handoff
    }

    /// Power state tracking of every CPU
    #[must_use]
    pub const fn power(&self) -> &PowerSequencer {
        &self.power
    }

    /// Parameters for the trusted firmware
    #[must_use]
    pub const fn atf_params(&self) -> &AtfHandoffParams {
        &self.atf
    }

    /// Number of partitions in the image
    pub(crate) fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}
