//! Processor Identities
//!
//! The SoC has four Cortex-A53 cores, two Cortex-R5 cores (usable split or
//! in lockstep) and the PMU MicroBlaze. Partition headers name them through
//! the destination CPU field of the attribute word; this module turns that
//! field into [`CpuId`] and attaches the per-core register layout
//! ([`CpuKind`]) the power sequencer and the reset-vector updater need.

pub mod power;
pub mod vector;

use crate::platform::zynqmp::{PowerIsland, crl_apb, rpu};

/// Destination CPU field of the partition attributes
pub const DEST_CPU_MASK: u32 = 0xF00;
/// A53 execution state bit of the partition attributes, set for AArch32
pub const EXEC_STATE_MASK: u32 = 0x8;
/// Vector location bit of the partition attributes
pub const VECTOR_LOCATION_MASK: u32 = 0x80_0000;
/// Shift of the vector location bit
pub const VECTOR_LOCATION_SHIFT: u32 = 23;

/// Processor a partition is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuId {
    /// No destination, resolved to the running CPU
    None,
    /// A53 core 0
    A53_0,
    /// A53 core 1
    A53_1,
    /// A53 core 2
    A53_2,
    /// A53 core 3
    A53_3,
    /// R5 core 0 in split mode
    R5_0,
    /// R5 core 1 in split mode
    R5_1,
    /// Both R5 cores in lockstep
    R5Lockstep,
    /// PMU MicroBlaze
    Pmu,
}

impl CpuId {
    /// Every encodable CPU, in attribute order
    pub const ALL: [Self; 9] = [
        Self::None,
        Self::A53_0,
        Self::A53_1,
        Self::A53_2,
        Self::A53_3,
        Self::R5_0,
        Self::R5_1,
        Self::R5Lockstep,
        Self::Pmu,
    ];

    /// Encoding in the destination CPU field
    #[must_use]
    pub const fn attr_value(self) -> u32 {
        (self as u32) << 8
    }

    /// Decode a destination CPU field; encodings past the PMU return `None`
    #[must_use]
    pub const fn from_attr(attributes: u32) -> Option<Self> {
        let index = ((attributes & DEST_CPU_MASK) >> 8) as usize;
        if index < Self::ALL.len() {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Register layout of this CPU
    #[must_use]
    pub const fn kind(self) -> CpuKind {
        match self {
            Self::None => CpuKind::None,
            Self::A53_0 => CpuKind::Apu { core: 0 },
            Self::A53_1 => CpuKind::Apu { core: 1 },
            Self::A53_2 => CpuKind::Apu { core: 2 },
            Self::A53_3 => CpuKind::Apu { core: 3 },
            Self::R5_0 => CpuKind::Rpu(RpuCores {
                lockstep: false,
                island: PowerIsland::R5_0,
                tcm: PowerIsland::TCM0A.union(PowerIsland::TCM0B),
                cfg: &[rpu::RPU_0_CFG],
                reset: crl_apb::RST_LPD_TOP_RPU_R50,
                tcm_alias: 0xFFE0_0000,
            }),
            Self::R5_1 => CpuKind::Rpu(RpuCores {
                lockstep: false,
                island: PowerIsland::R5_1,
                tcm: PowerIsland::TCM1A.union(PowerIsland::TCM1B),
                cfg: &[rpu::RPU_1_CFG],
                reset: crl_apb::RST_LPD_TOP_RPU_R51,
                tcm_alias: 0xFFE9_0000,
            }),
            Self::R5Lockstep => CpuKind::Rpu(RpuCores {
                lockstep: true,
                island: PowerIsland::R5_0,
                tcm: PowerIsland::TCM0A
                    .union(PowerIsland::TCM0B)
                    .union(PowerIsland::TCM1A)
                    .union(PowerIsland::TCM1B),
                cfg: &[rpu::RPU_0_CFG, rpu::RPU_1_CFG],
                reset: crl_apb::RST_LPD_TOP_RPU_R50 | crl_apb::RST_LPD_TOP_RPU_R51,
                tcm_alias: 0xFFE0_0000,
            }),
            Self::Pmu => CpuKind::Pmu,
        }
    }

    /// Any of the four A53 cores
    #[must_use]
    pub const fn is_a53(self) -> bool {
        matches!(self.kind(), CpuKind::Apu { .. })
    }

    /// Either R5 core or the lockstep pair
    #[must_use]
    pub const fn is_r5(self) -> bool {
        matches!(self, Self::R5_0 | Self::R5_1 | Self::R5Lockstep)
    }
}

/// Register layout of a CPU, one variant per processor family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuKind {
    /// Unresolved destination
    None,
    /// A53 core `core` of the APU
    Apu {
        /// Core index, 0..=3
        core: u32,
    },
    /// One or both R5 cores of the RPU
    Rpu(RpuCores),
    /// PMU MicroBlaze, never released by the boot loader
    Pmu,
}

/// RPU resources belonging to one R5 target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpuCores {
    /// Both cores run in lockstep
    pub lockstep: bool,
    /// Core power island
    pub island: PowerIsland,
    /// TCM bank islands
    pub tcm: PowerIsland,
    /// Per-core configuration registers
    pub cfg: &'static [u32],
    /// Core reset bits in `RST_LPD_TOP`
    pub reset: u32,
    /// Global address of the core's TCM
    pub tcm_alias: u32,
}

/// Destination device of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceId {
    /// No destination
    None,
    /// Processing system memory
    Ps,
    /// Programmable logic bitstream
    Pl,
    /// PMU RAM
    Pmu,
}

impl DeviceId {
    /// Destination device field of the partition attributes
    pub const MASK: u32 = 0x70;

    /// Decode a destination device field; encodings past the PMU return `None`
    #[must_use]
    pub const fn from_attr(attributes: u32) -> Option<Self> {
        match (attributes & Self::MASK) >> 4 {
            0 => Some(Self::None),
            1 => Some(Self::Ps),
            2 => Some(Self::Pl),
            3 => Some(Self::Pmu),
            _ => None,
        }
    }

    /// Encoding in the destination device field
    #[must_use]
    pub const fn attr_value(self) -> u32 {
        (self as u32) << 4
    }
}

/// A53 execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecState {
    /// 64-bit
    #[default]
    Aarch64,
    /// 32-bit
    Aarch32,
}

impl ExecState {
    /// Decode the execution state bit
    #[must_use]
    pub const fn from_attr(attributes: u32) -> Self {
        if attributes & EXEC_STATE_MASK != 0 {
            Self::Aarch32
        } else {
            Self::Aarch64
        }
    }

    /// Encoding in the attribute word
    #[must_use]
    pub const fn attr_value(self) -> u32 {
        match self {
            Self::Aarch64 => 0,
            Self::Aarch32 => EXEC_STATE_MASK,
        }
    }
}

/// Exception vector base selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorLocation {
    /// Low vectors at 0x0
    #[default]
    Low,
    /// High vectors at 0xFFFF_0000
    High,
}

impl VectorLocation {
    /// Decode the vector location bit
    #[must_use]
    pub const fn from_attr(attributes: u32) -> Self {
        if attributes & VECTOR_LOCATION_MASK != 0 {
            Self::High
        } else {
            Self::Low
        }
    }

    /// Value of the single `VINITHI` bit
    #[must_use]
    pub const fn bit(self) -> u32 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

/// Settings recorded for a CPU that receives control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSettings {
    /// Target CPU
    pub cpu: CpuId,
    /// Execution state (A53 only)
    pub exec_state: ExecState,
    /// Exception vector selection
    pub vector: VectorLocation,
}

impl CpuSettings {
    /// Settings for `cpu` with default state and vectors
    #[must_use]
    pub const fn new(cpu: CpuId) -> Self {
        Self {
            cpu,
            exec_state: ExecState::Aarch64,
            vector: VectorLocation::Low,
        }
    }

    /// Whether the target runs 32-bit code: any R5, or an A53 in AArch32
    #[must_use]
    pub const fn is_32bit(&self) -> bool {
        self.cpu.is_r5() || matches!(self.exec_state, ExecState::Aarch32)
    }

    /// Packed attribute-style encoding
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.cpu.attr_value()
            | self.exec_state.attr_value()
            | (self.vector.bit() << VECTOR_LOCATION_SHIFT)
    }
}
