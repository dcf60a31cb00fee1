//! Data Cache Maintenance
//!
//! The boot loader runs with the data cache on while it copies partitions
//! and must hand over clean memory: before releasing a core, or before
//! jumping to the next stage itself, the L1 data cache is cleaned,
//! invalidated and switched off.
//!
//! Maintenance is done by set/way over the L1 data cache. The geometry comes
//! from the cache size identification register, decoded by
//! [`CacheGeometry`].

#![warn(clippy::undocumented_unsafe_blocks)]

#[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
use core::arch::asm;

use super::barriers;

/// `SCTLR.C`, data cache enable
pub const SCTLR_C: u32 = 1 << 2;

/// Set/way geometry of one cache level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    /// Line size in bytes
    pub line_size: u32,
    /// Number of sets
    pub sets: u32,
    /// Number of ways
    pub ways: u32,
}

impl CacheGeometry {
    /// Decode a `CCSIDR` value (32-bit layout)
    #[must_use]
    pub const fn from_ccsidr(ccsidr: u32) -> Self {
        Self {
            line_size: 16 << (ccsidr & 0x7),
            ways: ((ccsidr >> 3) & 0x3FF) + 1,
            sets: ((ccsidr >> 13) & 0x7FFF) + 1,
        }
    }

    /// Total size in bytes
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.line_size * self.sets * self.ways
    }

    /// Bit position of the way field in a set/way operand
    #[must_use]
    pub const fn way_shift(&self) -> u32 {
        if self.ways <= 1 {
            0
        } else {
            (self.ways - 1).leading_zeros()
        }
    }

    /// Bit position of the set field in a set/way operand
    #[must_use]
    pub const fn set_shift(&self) -> u32 {
        self.line_size.trailing_zeros()
    }

    /// Set/way operand for `level` (zero based), `set` and `way`
    #[must_use]
    pub const fn set_way_operand(&self, level: u32, set: u32, way: u32) -> u32 {
        let way_bits = if self.ways <= 1 { 0 } else { way << self.way_shift() };
        way_bits | (set << self.set_shift()) | (level << 1)
    }

    /// Visit every set/way operand of this cache level
    pub fn for_each_set_way(&self, level: u32, mut op: impl FnMut(u32)) {
        for way in 0..self.ways {
            for set in 0..self.sets {
                op(self.set_way_operand(level, set, way));
            }
        }
    }
}

/// Geometry of the L1 data cache of the running core
#[must_use]
pub fn l1_dcache_geometry() -> CacheGeometry {
    #[cfg(target_arch = "aarch64")]
    {
        let ccsidr: u64;
        // SAFETY: selecting and reading the cache size id registers has no
        // effect beyond CSSELR_EL1, which nothing else in the loader uses.
        unsafe {
            asm!("msr csselr_el1, {}", in(reg) 0u64, options(nomem, nostack));
            asm!("isb", options(nomem, nostack));
            asm!("mrs {}, ccsidr_el1", out(reg) ccsidr, options(nomem, nostack));
        }
        CacheGeometry::from_ccsidr(ccsidr as u32)
    }
    #[cfg(target_arch = "arm")]
    {
        let ccsidr: u32;
        // SAFETY: see the AArch64 arm; CSSELR is only written here.
        unsafe {
            asm!("mcr p15, 2, {}, c0, c0, 0", in(reg) 0u32, options(nomem, nostack));
            asm!("isb", options(nomem, nostack));
            asm!("mrc p15, 1, {}, c0, c0, 0", out(reg) ccsidr, options(nomem, nostack));
        }
        CacheGeometry::from_ccsidr(ccsidr)
    }
    #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
    {
        // 32 KiB, 4-way, 64-byte lines
        CacheGeometry::from_ccsidr((127 << 13) | (3 << 3) | 2)
    }
}

/// Clean and invalidate the whole L1 data cache by set/way
pub fn dcache_clean_invalidate_all() {
    let geometry = l1_dcache_geometry();
    barriers::dsb();
    geometry.for_each_set_way(0, |operand| {
        #[cfg(target_arch = "aarch64")]
        // SAFETY: DC CISW only writes back and drops cache lines.
        unsafe {
            asm!("dc cisw, {}", in(reg) u64::from(operand), options(nostack));
        }
        #[cfg(target_arch = "arm")]
        // SAFETY: DCCISW only writes back and drops cache lines.
        unsafe {
            asm!("mcr p15, 0, {}, c7, c14, 2", in(reg) operand, options(nostack));
        }
        #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
        let _ = operand;
    });
    barriers::dsb();
    barriers::isb();
}

/// Set `SCTLR.C`
pub fn dcache_enable() {
    update_sctlr(|sctlr| sctlr | SCTLR_C);
}

/// Clear `SCTLR.C`; callers clean the cache first
pub fn dcache_disable() {
    update_sctlr(|sctlr| sctlr & !SCTLR_C);
}

fn update_sctlr(f: impl FnOnce(u32) -> u32) {
    #[cfg(target_arch = "aarch64")]
    {
        let sctlr: u64;
        // SAFETY: only the C bit is changed by the callers of this helper.
        unsafe {
            asm!("mrs {}, sctlr_el3", out(reg) sctlr, options(nomem, nostack));
        }
        let updated = (sctlr & !0xFFFF_FFFF) | u64::from(f(sctlr as u32));
        // SAFETY: see above.
        unsafe {
            asm!("msr sctlr_el3, {}", in(reg) updated, options(nostack));
        }
    }
    #[cfg(target_arch = "arm")]
    {
        let sctlr: u32;
        // SAFETY: only the C bit is changed by the callers of this helper.
        unsafe {
            asm!("mrc p15, 0, {}, c1, c0, 0", out(reg) sctlr, options(nomem, nostack));
            asm!("mcr p15, 0, {}, c1, c0, 0", in(reg) f(sctlr), options(nostack));
        }
    }
    #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
    let _ = f(0);

    barriers::dsb();
    barriers::isb();
}
