//! Load Address Legality
//!
//! Where a partition may be placed depends on who runs it. PMU firmware goes
//! to PMU RAM, split R5 code to one of the two TCM banks of that core,
//! lockstep R5 code to the combined TCM, everything else to DDR or the top
//! OCM bank. The bounds live in [`MemoryMap`] so board variants only change
//! configuration.
//!
//! TCM addresses in partition headers are core-local (starting at zero).
//! The boot core reaches them through global aliases, see [`remap_tcm`].

use crate::cpu::{CpuId, CpuKind, DeviceId};

/// Inclusive address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    /// First address
    pub start: u64,
    /// Last address
    pub end: u64,
}

impl MemoryRange {
    /// Range covering `start..=end`
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Whether `address` lies inside the range
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.start && address <= self.end
    }
}

/// Legal load regions and fixed windows of the SoC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    /// PMU RAM
    pub pmu_ram: MemoryRange,
    /// TCM bank A of a split R5
    pub tcm_a: MemoryRange,
    /// TCM bank B of a split R5
    pub tcm_b: MemoryRange,
    /// Combined TCM of the lockstep pair
    pub tcm_lockstep: MemoryRange,
    /// Low PS DDR
    pub ps_ddr: MemoryRange,
    /// High PS DDR, when populated
    pub ps_ddr_high: Option<MemoryRange>,
    /// PL DDR, when the design provides one
    pub pl_ddr: Option<MemoryRange>,
    /// Last OCM bank, when usable by applications
    pub ocm: Option<MemoryRange>,
    /// QSPI linear window used by execute-in-place partitions
    pub qspi_linear: MemoryRange,
    /// Lowest DDR address an A53 partition may use when loaded from an R5
    pub r5_reserved_floor: u64,
    /// Load address marking a bitstream without a staging address
    pub pl_sentinel: u64,
}

impl MemoryMap {
    /// Memory map of the ZynqMP
    pub const ZYNQMP: Self = Self {
        pmu_ram: MemoryRange::new(0xFFDC_0000, 0xFFDD_FFFF),
        tcm_a: MemoryRange::new(0x0000_0000, 0x0000_FFFF),
        tcm_b: MemoryRange::new(0x0002_0000, 0x0002_FFFF),
        tcm_lockstep: MemoryRange::new(0x0000_0000, 0x0003_FFFF),
        ps_ddr: MemoryRange::new(0x0000_0000, 0x7FFF_FFFF),
        ps_ddr_high: Some(MemoryRange::new(0x8_0000_0000, 0x8_7FFF_FFFF)),
        pl_ddr: None,
        ocm: Some(MemoryRange::new(0xFFFE_A000, 0xFFFF_FFFF)),
        qspi_linear: MemoryRange::new(0xC000_0000, 0xDFFF_FFFF),
        r5_reserved_floor: 0x8_0000,
        pl_sentinel: 0xFFFF_FFFF,
    };

    /// Whether `address` is a legal load address for `cpu` and `device`
    #[must_use]
    pub fn is_valid_address(&self, address: u64, cpu: CpuId, device: DeviceId) -> bool {
        if device == DeviceId::Pl && address == self.pl_sentinel {
            return true;
        }

        match cpu {
            CpuId::Pmu => self.pmu_ram.contains(address),
            CpuId::R5_0 | CpuId::R5_1 => {
                self.tcm_a.contains(address) || self.tcm_b.contains(address)
            }
            CpuId::R5Lockstep => self.tcm_lockstep.contains(address),
            _ => {
                self.ps_ddr.contains(address)
                    || [self.ps_ddr_high, self.pl_ddr, self.ocm]
                        .iter()
                        .flatten()
                        .any(|range| range.contains(address))
            }
        }
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::ZYNQMP
    }
}

/// Translate a core-local TCM load address to its global alias.
///
/// Addresses outside the target's TCM are returned unchanged. Returns `None`
/// when the payload runs past the end of the TCM bank it starts in.
#[must_use]
pub fn remap_tcm(map: &MemoryMap, cpu: CpuId, address: u64, length: u32) -> Option<u64> {
    let CpuKind::Rpu(cores) = cpu.kind() else {
        return Some(address);
    };

    let banks: &[MemoryRange] = if cores.lockstep {
        &[map.tcm_lockstep]
    } else {
        &[map.tcm_a, map.tcm_b]
    };
    let Some(bank) = banks.iter().find(|bank| bank.contains(address)) else {
        return Some(address);
    };

    if length > 0 && address + u64::from(length) - 1 > bank.end {
        return None;
    }
    Some(u64::from(cores.tcm_alias) + address)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: MemoryMap = MemoryMap::ZYNQMP;

    fn check(cpu: CpuId, range: MemoryRange) {
        assert!(MAP.is_valid_address(range.start, cpu, DeviceId::Ps), "{cpu:?} start");
        assert!(MAP.is_valid_address(range.end, cpu, DeviceId::Ps), "{cpu:?} end");
        assert!(!MAP.is_valid_address(range.end + 1, cpu, DeviceId::Ps), "{cpu:?} end + 1");
        if range.start > 0 {
            assert!(!MAP.is_valid_address(range.start - 1, cpu, DeviceId::Ps), "{cpu:?} start - 1");
        }
    }

    #[test]
    fn pmu_targets_only_pmu_ram() {
        check(CpuId::Pmu, MAP.pmu_ram);
        assert!(!MAP.is_valid_address(0x10_0000, CpuId::Pmu, DeviceId::Pmu));
    }

    #[test]
    fn split_r5_targets_either_tcm_bank() {
        for cpu in [CpuId::R5_0, CpuId::R5_1] {
            check(cpu, MAP.tcm_b);
            assert!(MAP.is_valid_address(0x0, cpu, DeviceId::Ps));
            assert!(MAP.is_valid_address(0xFFFF, cpu, DeviceId::Ps));
            assert!(!MAP.is_valid_address(0x1_0000, cpu, DeviceId::Ps));
            assert!(!MAP.is_valid_address(0x20_0000, cpu, DeviceId::Ps));
        }
    }

    #[test]
    fn lockstep_targets_combined_tcm() {
        check(CpuId::R5Lockstep, MAP.tcm_lockstep);
        assert!(MAP.is_valid_address(0x1_0000, CpuId::R5Lockstep, DeviceId::Ps));
    }

    #[test]
    fn application_cores_target_ddr_and_ocm() {
        for cpu in [CpuId::A53_0, CpuId::A53_3, CpuId::None] {
            assert!(MAP.is_valid_address(0x0, cpu, DeviceId::Ps));
            assert!(MAP.is_valid_address(0x7FFF_FFFF, cpu, DeviceId::Ps));
            assert!(!MAP.is_valid_address(0x8000_0000, cpu, DeviceId::Ps));
            check(cpu, MAP.ps_ddr_high.unwrap());
            assert!(MAP.is_valid_address(0xFFFE_A000, cpu, DeviceId::Ps));
            assert!(!MAP.is_valid_address(0xFFFE_9FFF, cpu, DeviceId::Ps));
            assert!(MAP.is_valid_address(0xFFFF_FFFF, cpu, DeviceId::Ps));
            assert!(!MAP.is_valid_address(0x1_0000_0000, cpu, DeviceId::Ps));
        }
    }

    #[test]
    fn optional_regions_are_honoured() {
        let mut map = MAP;
        map.ocm = None;
        map.pl_ddr = Some(MemoryRange::new(0x10_0000_0000, 0x10_FFFF_FFFF));
        assert!(!map.is_valid_address(0xFFFE_A000, CpuId::A53_0, DeviceId::Ps));
        assert!(map.is_valid_address(0x10_0000_0000, CpuId::A53_0, DeviceId::Ps));
        assert!(!map.is_valid_address(0x11_0000_0000, CpuId::A53_0, DeviceId::Ps));
    }

    #[test]
    fn pl_sentinel_is_legal_for_any_cpu() {
        for cpu in CpuId::ALL {
            assert!(MAP.is_valid_address(0xFFFF_FFFF, cpu, DeviceId::Pl));
        }
        assert!(!MAP.is_valid_address(0xFFFF_FFFF, CpuId::Pmu, DeviceId::Ps));
        assert!(!MAP.is_valid_address(0xFFFF_FFFE, CpuId::R5_0, DeviceId::Pl));
    }

    #[test]
    fn tcm_remap_per_target() {
        assert_eq!(remap_tcm(&MAP, CpuId::R5_0, 0x100, 0x800), Some(0xFFE0_0100));
        assert_eq!(remap_tcm(&MAP, CpuId::R5_1, 0x2_0000, 0x800), Some(0xFFEB_0000));
        assert_eq!(remap_tcm(&MAP, CpuId::R5Lockstep, 0x3_0000, 0x1_0000), Some(0xFFE3_0000));
        assert_eq!(remap_tcm(&MAP, CpuId::A53_0, 0x100, 0x800), Some(0x100));
        assert_eq!(remap_tcm(&MAP, CpuId::R5_0, 0x10_0000, 0x80_0000), Some(0x10_0000));
    }

    #[test]
    fn tcm_overflow_is_rejected() {
        assert_eq!(remap_tcm(&MAP, CpuId::R5_0, 0x0, 0x1_0001), None);
        assert_eq!(remap_tcm(&MAP, CpuId::R5_0, 0x0, 0x1_0000), Some(0xFFE0_0000));
        assert_eq!(remap_tcm(&MAP, CpuId::R5Lockstep, 0x0, 0x4_0001), None);
    }

    #[test]
    fn payload_must_end_inside_its_bank() {
        assert_eq!(remap_tcm(&MAP, CpuId::R5_0, 0xFF00, 0x100), Some(0xFFE0_FF00));
        assert_eq!(remap_tcm(&MAP, CpuId::R5_0, 0xFF00, 0x1_0000), None);
        assert_eq!(remap_tcm(&MAP, CpuId::R5_1, 0x2_FFFC, 0x8), None);
        assert_eq!(remap_tcm(&MAP, CpuId::R5Lockstep, 0x3_0000, 0x1_0001), None);
    }
}
