//! CPU Power, Clock and Reset Sequencing
//!
//! Bringing a core out of reset is a two step affair driven by the boot core:
//!
//! ```text
//! PowerUp:   Off -> PoweringUp -> (PMU ack) -> Clocked
//! SoftReset: Clocked -> ResetAsserted -> Running
//! ```
//!
//! `PowerUp` requests the power island through the PMU, waits for the
//! acknowledgement within the configured poll budget and enables the core
//! clock. Between the two steps the caller programs the reset vector.
//! `SoftReset` configures the execution mode, holds the core, releases its
//! reset and lets it run.
//!
//! The register sequences per processor family come from [`CpuKind`]; no
//! per-core switch arms are duplicated here.

use thiserror_no_std::Error;

use super::{CpuId, CpuKind, CpuSettings, ExecState, RpuCores};
use crate::debug_print;
use crate::platform::zynqmp::{PowerIsland, apu, crf_apb, crl_apb, efuse, pmu_global, rpu};
use crate::platform::{Platform, poll_register};

/// Clock propagation delay after enabling the R5 clock
pub const R5_CLOCK_DELAY_US: u32 = 0x50;

/// Power sequencing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PowerError {
    /// The CPU is fused off on this silicon
    #[error("{0:?} is not available on this device")]
    UnavailableCpu(CpuId),
    /// The PMU never acknowledged a power up request
    #[error("power up of islands {mask:#x} not acknowledged (pending {pending:#x})")]
    Timeout {
        /// Requested island mask
        mask: u32,
        /// Request bits still pending at the last poll
        pending: u32,
    },
    /// Soft reset requested for a CPU that was never powered up
    #[error("{0:?} released from reset before power up")]
    NotPowered(CpuId),
    /// The CPU cannot be sequenced by the boot loader
    #[error("{0:?} cannot be powered or reset")]
    InvalidTarget(CpuId),
}

impl PowerError {
    /// Numeric status code
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::UnavailableCpu(_) => 0x30,
            Self::Timeout { .. } => 0x31,
            Self::NotPowered(_) => 0x32,
            Self::InvalidTarget(_) => 0x33,
        }
    }
}

/// Result type for power sequencing
pub type PowerResult<T> = Result<T, PowerError>;

/// Lifecycle of a CPU as driven by the boot core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuPowerState {
    /// Island not requested
    #[default]
    Off,
    /// Island requested, acknowledgement pending or lost
    PoweringUp,
    /// Island up and core clock running
    Clocked,
    /// Core configured and held halted
    ResetAsserted,
    /// Core executing
    Running,
}

/// Sequencing step requested from [`PowerSequencer::power_and_reset_cpu`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// Request the power island and enable the clock
    PowerUp,
    /// Configure execution mode and release the core from reset
    SoftReset,
}

/// Per-CPU power state tracking plus the register sequences
#[derive(Debug, Clone)]
pub struct PowerSequencer {
    states: [CpuPowerState; CpuId::ALL.len()],
    poll_budget: u32,
}

impl PowerSequencer {
    /// Every CPU off; power acknowledgements polled at most `poll_budget` times
    #[must_use]
    pub const fn new(poll_budget: u32) -> Self {
        Self {
            states: [CpuPowerState::Off; CpuId::ALL.len()],
            poll_budget,
        }
    }

    /// Current state of `cpu`
    #[must_use]
    pub const fn state(&self, cpu: CpuId) -> CpuPowerState {
        self.states[cpu as usize]
    }

    /// Record that `cpu` is the core executing the boot loader
    pub fn mark_running(&mut self, cpu: CpuId) {
        self.states[cpu as usize] = CpuPowerState::Running;
    }

    fn advance(&mut self, cpu: CpuId, state: CpuPowerState) {
        let slot = &mut self.states[cpu as usize];
        *slot = (*slot).max(state);
    }

    /// Run one sequencing step for the CPU named in `settings`
    pub fn power_and_reset_cpu<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        settings: CpuSettings,
        action: PowerAction,
    ) -> PowerResult<()> {
        let cpu = settings.cpu;
        if !is_cpu_supported(&*platform, cpu) {
            return Err(PowerError::UnavailableCpu(cpu));
        }

        match action {
            PowerAction::PowerUp => self.power_up(platform, cpu),
            PowerAction::SoftReset => self.soft_reset(platform, settings),
        }
    }

    fn power_up<P: Platform + ?Sized>(&mut self, platform: &mut P, cpu: CpuId) -> PowerResult<()> {
        match cpu.kind() {
            CpuKind::Apu { core } => {
                self.request_island(platform, cpu, apu_island(core))?;
                platform.set_bits(
                    crf_apb::ACPU_CTRL,
                    crf_apb::ACPU_CTRL_CLKACT_FULL | crf_apb::ACPU_CTRL_CLKACT_HALF,
                );
            }
            CpuKind::Rpu(cores) => {
                self.request_island(platform, cpu, cores.island)?;
                platform.set_bits(crl_apb::CPU_R5_CTRL, crl_apb::CPU_R5_CTRL_CLKACT);
                platform.delay_us(R5_CLOCK_DELAY_US);
            }
            CpuKind::None | CpuKind::Pmu => return Err(PowerError::InvalidTarget(cpu)),
        }

        self.advance(cpu, CpuPowerState::Clocked);
        debug_print!(DEBUG, "{:?} powered and clocked", cpu);
        Ok(())
    }

    fn soft_reset<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        settings: CpuSettings,
    ) -> PowerResult<()> {
        let cpu = settings.cpu;
        if self.state(cpu) < CpuPowerState::Clocked {
            return Err(PowerError::NotPowered(cpu));
        }

        match cpu.kind() {
            CpuKind::Apu { core } => {
                if settings.exec_state == ExecState::Aarch32 {
                    platform.clear_bits(apu::CONFIG_0, apu::aa64n32(core));
                }
                self.advance(cpu, CpuPowerState::ResetAsserted);
                platform.clear_bits(
                    crf_apb::RST_FPD_APU,
                    crf_apb::acpu_reset(core)
                        | crf_apb::RST_FPD_APU_L2
                        | crf_apb::acpu_pwron_reset(core),
                );
            }
            CpuKind::Rpu(cores) => {
                configure_rpu_mode(platform, &cores);
                halt_cores(platform, &cores);
                self.advance(cpu, CpuPowerState::ResetAsserted);
                release_rpu_reset(platform, &cores);
                for cfg in cores.cfg {
                    platform.set_bits(*cfg, rpu::CFG_NCPUHALT);
                }
            }
            CpuKind::None | CpuKind::Pmu => return Err(PowerError::InvalidTarget(cpu)),
        }

        self.advance(cpu, CpuPowerState::Running);
        debug_print!(INFO, "{:?} released from reset", cpu);
        Ok(())
    }

    /// Power up the TCM of an R5 target so it can be loaded, leaving the
    /// core itself halted
    pub fn power_up_tcm<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        cpu: CpuId,
    ) -> PowerResult<()> {
        let CpuKind::Rpu(cores) = cpu.kind() else {
            return Err(PowerError::InvalidTarget(cpu));
        };

        self.request_island(platform, cpu, cores.island | cores.tcm)?;
        configure_rpu_mode(platform, &cores);
        halt_cores(platform, &cores);
        platform.set_bits(crl_apb::CPU_R5_CTRL, crl_apb::CPU_R5_CTRL_CLKACT);
        platform.delay_us(R5_CLOCK_DELAY_US);
        release_rpu_reset(platform, &cores);

        self.advance(cpu, CpuPowerState::ResetAsserted);
        debug_print!(DEBUG, "{:?} TCM powered, core halted", cpu);
        Ok(())
    }

    fn request_island<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        cpu: CpuId,
        island: PowerIsland,
    ) -> PowerResult<()> {
        self.advance(cpu, CpuPowerState::PoweringUp);
        power_up_island(platform, island, self.poll_budget)
    }
}

/// Islands of A53 core `core`: the core, the full power domain and L2
#[must_use]
pub fn apu_island(core: u32) -> PowerIsland {
    PowerIsland::from_bits_truncate(PowerIsland::ACPU0.bits() << core)
        | PowerIsland::FP
        | PowerIsland::L2_BANK0
}

/// Request `island` from the PMU and wait for the acknowledgement
pub fn power_up_island<P: Platform + ?Sized>(
    platform: &mut P,
    island: PowerIsland,
    budget: u32,
) -> PowerResult<()> {
    let mask = island.request_mask();
    platform.write32(pmu_global::REQ_PWRUP_INT_EN, mask);
    platform.write32(pmu_global::REQ_PWRUP_TRIG, mask);

    poll_register(&*platform, pmu_global::REQ_PWRUP_STATUS, mask, 0, budget)
        .map(|_| ())
        .map_err(|timeout| {
            debug_print!(ERROR, "power up request {:#x} timed out", mask);
            PowerError::Timeout {
                mask,
                pending: timeout.last,
            }
        })
}

/// Whether `cpu` exists on this silicon.
///
/// The dual-core CG parts blow the APU2/APU3 and GPU disable fuses.
pub fn is_cpu_supported<P: Platform + ?Sized>(platform: &P, cpu: CpuId) -> bool {
    let cg_part = platform.read32(efuse::IPDISABLE) & efuse::IPDISABLE_CG == efuse::IPDISABLE_CG;
    !(cg_part && matches!(cpu, CpuId::A53_2 | CpuId::A53_3))
}

fn configure_rpu_mode<P: Platform + ?Sized>(platform: &mut P, cores: &RpuCores) {
    let mut value = platform.read32(rpu::GLBL_CNTL);
    if cores.lockstep {
        value &= !rpu::GLBL_CNTL_SLSPLIT;
        value |= rpu::GLBL_CNTL_TCM_COMB | rpu::GLBL_CNTL_SLCLAMP;
    } else {
        value |= rpu::GLBL_CNTL_SLSPLIT;
        value &= !(rpu::GLBL_CNTL_TCM_COMB | rpu::GLBL_CNTL_SLCLAMP);
    }
    platform.write32(rpu::GLBL_CNTL, value);
}

fn halt_cores<P: Platform + ?Sized>(platform: &mut P, cores: &RpuCores) {
    for cfg in cores.cfg {
        platform.clear_bits(*cfg, rpu::CFG_NCPUHALT);
    }
}

fn release_rpu_reset<P: Platform + ?Sized>(platform: &mut P, cores: &RpuCores) {
    platform.clear_bits(
        crl_apb::RST_LPD_TOP,
        cores.reset | crl_apb::RST_LPD_TOP_RPU_AMBA,
    );
}
