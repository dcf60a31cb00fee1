//! Architecture Support
//!
//! Core-local operations for the two processor families the boot loader can
//! run on: Cortex-A53 in AArch64 state and Cortex-R5 in AArch32 state.
//! Everything here is either a volatile register access or a short inline
//! assembly sequence; the rest of the crate reaches it only through
//! [`crate::platform::zynqmp::ZynqMpPlatform`].
//!
//! On any other architecture (hosted builds, tests) the assembly paths fall
//! back to inert stand-ins so the library still compiles.

#![warn(clippy::undocumented_unsafe_blocks)]

pub mod cache;
pub mod uart;

#[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
use core::arch::asm;

/// Read a 32-bit device register
///
/// # Safety
///
/// `addr` must be a valid, 4-byte aligned device register address.
#[inline]
pub unsafe fn mmio_read(addr: u32) -> u32 {
    let reg = addr as usize as *const u32;
    // SAFETY: the caller guarantees the address is a mapped device register.
    unsafe { reg.read_volatile() }
}

/// Write a 32-bit device register
///
/// # Safety
///
/// `addr` must be a valid, 4-byte aligned device register address.
#[inline]
pub unsafe fn mmio_write(addr: u32, value: u32) {
    let reg = addr as usize as *mut u32;
    // SAFETY: the caller guarantees the address is a mapped device register.
    unsafe { reg.write_volatile(value) }
}

/// Memory barrier implementations
pub mod barriers {
    #[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
    use core::arch::asm;

    /// Data synchronization barrier
    #[inline]
    pub fn dsb() {
        #[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
        // SAFETY: barrier instruction, no memory or register side effects.
        unsafe {
            asm!("dsb sy", options(nostack, preserves_flags));
        }
        #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Instruction synchronization barrier
    #[inline]
    pub fn isb() {
        #[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
        // SAFETY: barrier instruction, no memory or register side effects.
        unsafe {
            asm!("isb", options(nostack, preserves_flags));
        }
    }
}

/// Multiprocessor affinity register of the running core
#[must_use]
pub fn read_mpidr() -> u64 {
    #[cfg(target_arch = "aarch64")]
    {
        let mpidr: u64;
        // SAFETY: MPIDR_EL1 is readable at every exception level.
        unsafe {
            asm!("mrs {}, mpidr_el1", out(reg) mpidr, options(nomem, nostack));
        }
        mpidr
    }
    #[cfg(target_arch = "arm")]
    {
        let mpidr: u32;
        // SAFETY: MPIDR read through CP15 has no side effects.
        unsafe {
            asm!("mrc p15, 0, {}, c0, c0, 5", out(reg) mpidr, options(nomem, nostack));
        }
        u64::from(mpidr)
    }
    #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
    {
        0
    }
}

/// Approximate busy delay, calibrated for the boot clock of both core types
pub fn spin_delay_us(us: u32) {
    const LOOPS_PER_US: u32 = 100;
    for _ in 0..us.saturating_mul(LOOPS_PER_US) {
        core::hint::spin_loop();
    }
}

/// Jump to `address` and never return
///
/// # Safety
///
/// `address` must hold valid code for the running core's execution state,
/// with the data cache already cleaned and disabled.
pub unsafe fn jump_to(address: u64) -> ! {
    barriers::dsb();
    barriers::isb();

    #[cfg(target_arch = "aarch64")]
    // SAFETY: the caller guarantees `address` is a valid entry point.
    unsafe {
        asm!("br {}", in(reg) address, options(noreturn));
    }
    #[cfg(target_arch = "arm")]
    // SAFETY: the caller guarantees `address` is a valid entry point.
    unsafe {
        asm!("bx {}", in(reg) address as u32, options(noreturn));
    }
    #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
    {
        let _ = address;
        park()
    }
}

/// Park the running core forever
pub fn park() -> ! {
    loop {
        #[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
        // SAFETY: wait-for-event only idles the core.
        unsafe {
            asm!("wfe", options(nomem, nostack));
        }
        #[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
        core::hint::spin_loop();
    }
}
