//! Simulated Platform
//!
//! A fixed-capacity register file standing in for the SoC. Reads of a
//! register that was never written return zero, writes are stored and
//! appended to a write log so tests can assert both the final register state
//! and the order in which the boot flow touched the hardware.
//!
//! Two pieces of hardware behaviour are modelled because the boot flow polls
//! on them:
//! - power up requests complete at once (`REQ_PWRUP_STATUS` stays clear)
//!   unless a test pins the status register
//! - waking the PMU sets `FW_IS_PRESENT`
//!
//! Any register can be pinned to a fixed value to model stuck hardware.

use heapless::{FnvIndexMap, Vec};

use super::Platform;
use super::zynqmp::pmu_global;
use crate::image::atf::AtfHandoffParams;

/// Maximum number of distinct registers the model holds
pub const SIM_REGISTERS: usize = 128;

/// Maximum number of logged writes
pub const SIM_WRITE_LOG: usize = 512;

/// Address the simulated platform reports for published ATF parameters
pub const SIM_ATF_PARAMS_ADDRESS: u32 = 0xFFFE_F000;

/// Register file model of the SoC
#[derive(Debug, Clone)]
pub struct SimPlatform {
    registers: FnvIndexMap<u32, u32, SIM_REGISTERS>,
    pinned: FnvIndexMap<u32, u32, 16>,
    writes: Vec<(u32, u32), SIM_WRITE_LOG>,
    overflowed: bool,
    cluster_id: u64,
    aarch64: bool,
    dcache_enabled: bool,
    dcache_disables: u32,
    delay_us_total: u64,
    atf_params: Option<AtfHandoffParams>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    /// Empty register file, running on A53-0 in AArch64 state
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: FnvIndexMap::new(),
            pinned: FnvIndexMap::new(),
            writes: Vec::new(),
            overflowed: false,
            cluster_id: 0,
            aarch64: true,
            dcache_enabled: true,
            dcache_disables: 0,
            delay_us_total: 0,
            atf_params: None,
        }
    }

    /// Set the affinity value reported for the running core
    #[must_use]
    pub fn with_cluster_id(mut self, cluster_id: u64) -> Self {
        self.cluster_id = cluster_id;
        self
    }

    /// Set the execution state of the running core
    #[must_use]
    pub fn with_aarch64(mut self, aarch64: bool) -> Self {
        self.aarch64 = aarch64;
        self
    }

    /// Store a register value without logging it as a write
    pub fn preset(&mut self, addr: u32, value: u32) {
        self.store(addr, value);
    }

    /// Pin a register: reads return `value` whatever gets written
    pub fn pin(&mut self, addr: u32, value: u32) {
        if self.pinned.insert(addr, value).is_err() {
            self.overflowed = true;
        }
    }

    /// Every write in issue order
    #[must_use]
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    /// Values written to `addr`, in issue order
    pub fn writes_to(&self, addr: u32) -> impl Iterator<Item = u32> + '_ {
        self.writes
            .iter()
            .filter(move |(a, _)| *a == addr)
            .map(|(_, v)| *v)
    }

    /// Whether the register file or the write log ran out of room
    #[must_use]
    pub const fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Whether the data cache is currently enabled
    #[must_use]
    pub const fn dcache_enabled(&self) -> bool {
        self.dcache_enabled
    }

    /// Number of times the data cache was disabled
    #[must_use]
    pub const fn dcache_disables(&self) -> u32 {
        self.dcache_disables
    }

    /// Total requested delay
    #[must_use]
    pub const fn delay_us_total(&self) -> u64 {
        self.delay_us_total
    }

    /// Last ATF parameter block handed to the platform
    #[must_use]
    pub const fn atf_params(&self) -> Option<&AtfHandoffParams> {
        self.atf_params.as_ref()
    }

    fn store(&mut self, addr: u32, value: u32) {
        if self.registers.insert(addr, value).is_err() {
            self.overflowed = true;
        }
    }
}

impl Platform for SimPlatform {
    fn read32(&self, addr: u32) -> u32 {
        if let Some(value) = self.pinned.get(&addr) {
            return *value;
        }
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        if self.writes.push((addr, value)).is_err() {
            self.overflowed = true;
        }

        let mut stored = value;
        if addr == pmu_global::GLOBAL_CNTRL && value & pmu_global::GLOBAL_CNTRL_WAKE != 0 {
            stored |= pmu_global::GLOBAL_CNTRL_FW_IS_PRESENT;
        }
        self.store(addr, stored);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_us_total += u64::from(us);
    }

    fn cluster_id(&self) -> u64 {
        self.cluster_id
    }

    fn is_aarch64(&self) -> bool {
        self.aarch64
    }

    fn dcache_enable(&mut self) {
        self.dcache_enabled = true;
    }

    fn dcache_disable(&mut self) {
        self.dcache_enabled = false;
        self.dcache_disables += 1;
    }

    fn publish_atf_params(&mut self, params: &AtfHandoffParams) -> u32 {
        self.atf_params = Some(*params);
        SIM_ATF_PARAMS_ADDRESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_registers_read_zero() {
        let sim = SimPlatform::new();
        assert_eq!(sim.read32(0xFFD8_0110), 0);
    }

    #[test]
    fn writes_are_logged_in_order() {
        let mut sim = SimPlatform::new();
        sim.write32(0x10, 1);
        sim.write32(0x20, 2);
        sim.write32(0x10, 3);
        assert_eq!(sim.writes(), &[(0x10, 1), (0x20, 2), (0x10, 3)]);
        assert_eq!(sim.writes_to(0x10).collect::<std::vec::Vec<_>>(), [1, 3]);
        assert_eq!(sim.read32(0x10), 3);
    }

    #[test]
    fn preset_is_not_logged() {
        let mut sim = SimPlatform::new();
        sim.preset(0x30, 7);
        assert!(sim.writes().is_empty());
        assert_eq!(sim.read32(0x30), 7);
    }

    #[test]
    fn pinned_register_ignores_writes() {
        let mut sim = SimPlatform::new();
        sim.pin(0x40, 0xDEAD);
        sim.write32(0x40, 0);
        assert_eq!(sim.read32(0x40), 0xDEAD);
        assert_eq!(sim.writes_to(0x40).count(), 1);
    }

    #[test]
    fn waking_the_pmu_reports_firmware_present() {
        let mut sim = SimPlatform::new();
        sim.write32(pmu_global::GLOBAL_CNTRL, pmu_global::GLOBAL_CNTRL_WAKE);
        assert_ne!(
            sim.read32(pmu_global::GLOBAL_CNTRL) & pmu_global::GLOBAL_CNTRL_FW_IS_PRESENT,
            0
        );
    }
}
