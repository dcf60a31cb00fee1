//! Platform Abstraction Layer
//!
//! This module defines the narrow hardware interface the boot flow is written
//! against. The loader never touches a register directly: every read, write,
//! delay and cache operation goes through [`Platform`], which keeps the stage
//! machine independent of whether it runs on silicon or in a hosted test.
//!
//! # Implementations
//!
//! - [`zynqmp::ZynqMpPlatform`]: volatile MMIO on the target SoC
//! - [`sim::SimPlatform`]: register file model used by the test suite
//!
//! # Waiting on Hardware
//!
//! Power island requests and PMU wake-ups are acknowledged asynchronously.
//! [`poll_register`] is the only busy-wait in the crate and always runs
//! against an iteration budget, returning [`PollTimeout`] when exhausted.

use thiserror_no_std::Error;

use crate::image::atf::AtfHandoffParams;

pub mod sim;
pub mod zynqmp;

/// Register level access to the SoC plus the handful of core-local
/// operations the boot flow needs.
pub trait Platform {
    /// Read a 32-bit register
    fn read32(&self, addr: u32) -> u32;

    /// Write a 32-bit register
    fn write32(&mut self, addr: u32, value: u32);

    /// Read-modify-write setting `mask`
    fn set_bits(&mut self, addr: u32, mask: u32) {
        let value = self.read32(addr);
        self.write32(addr, value | mask);
    }

    /// Read-modify-write clearing `mask`
    fn clear_bits(&mut self, addr: u32, mask: u32) {
        let value = self.read32(addr);
        self.write32(addr, value & !mask);
    }

    /// Busy delay in microseconds
    fn delay_us(&mut self, us: u32);

    /// Multiprocessor affinity register of the running core
    fn cluster_id(&self) -> u64;

    /// Whether the boot loader itself executes in AArch64 state
    fn is_aarch64(&self) -> bool;

    /// Enable the data cache of the running core
    fn dcache_enable(&mut self);

    /// Clean, invalidate and disable the data cache of the running core
    fn dcache_disable(&mut self);

    /// Copy the ATF handoff parameters to their placed storage and return
    /// the 32-bit address the next stage reads them from.
    fn publish_atf_params(&mut self, params: &AtfHandoffParams) -> u32;
}

/// A hardware acknowledgement did not arrive within the poll budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("register {addr:#010x} never matched {expected:#x} under mask {mask:#x} (last {last:#x})")]
pub struct PollTimeout {
    /// Register being polled
    pub addr: u32,
    /// Bits of interest
    pub mask: u32,
    /// Value the masked bits had to reach
    pub expected: u32,
    /// Last masked value observed
    pub last: u32,
}

/// Poll `addr` until `value & mask == expected`, at most `budget` reads.
///
/// Returns the number of reads it took.
pub fn poll_register<P: Platform + ?Sized>(
    platform: &P,
    addr: u32,
    mask: u32,
    expected: u32,
    budget: u32,
) -> Result<u32, PollTimeout> {
    let mut last = 0;
    for attempt in 1..=budget.max(1) {
        last = platform.read32(addr) & mask;
        if last == expected {
            return Ok(attempt);
        }
    }

    Err(PollTimeout {
        addr,
        mask,
        expected,
        last,
    })
}
