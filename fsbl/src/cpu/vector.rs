//! Reset Vector Programming
//!
//! 32-bit targets start from their low or high exception vectors, selected by
//! a `VINITHI` bit (per R5 in the RPU config registers, per A53 in the shared
//! APU `CONFIG_0`). 64-bit A53 targets start from the address held in their
//! RVBAR register pair.

use super::{CpuKind, CpuSettings, VectorLocation};
use crate::platform::Platform;
use crate::platform::zynqmp::{apu, rpu};

/// Program the entry point of the CPU named in `settings`
pub fn set_entry_point<P: Platform + ?Sized>(
    platform: &mut P,
    handoff_address: u64,
    settings: CpuSettings,
    vector: VectorLocation,
) {
    match settings.cpu.kind() {
        CpuKind::Rpu(cores) => {
            // the lockstep pair boots from R5-0's configuration
            if let Some(cfg) = cores.cfg.first() {
                write_field(platform, *cfg, rpu::CFG_VINITHI, vector.bit() << rpu::CFG_VINITHI_SHIFT);
            }
        }
        CpuKind::Apu { core } if settings.is_32bit() => {
            let shift = apu::vinithi_shift(core);
            write_field(platform, apu::CONFIG_0, 1 << shift, vector.bit() << shift);
        }
        CpuKind::Apu { core } => {
            platform.write32(apu::rvbar_low(core), handoff_address as u32);
            platform.write32(apu::rvbar_high(core), (handoff_address >> 32) as u32);
        }
        CpuKind::None | CpuKind::Pmu => {}
    }
}

fn write_field<P: Platform + ?Sized>(platform: &mut P, addr: u32, mask: u32, value: u32) {
    let current = platform.read32(addr);
    platform.write32(addr, (current & !mask) | (value & mask));
}
