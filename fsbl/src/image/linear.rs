//! Memory-Mapped Boot Device
//!
//! QSPI flash in linear mode appears as a read-only window in the physical
//! address space. Image reads and payload copies are plain memory copies out
//! of that window.

use core::ptr;

use super::{BootDevice, ImageSource, IoError};
use crate::boot::BootMode;

/// Base of the QSPI linear window
pub const QSPI_LINEAR_BASE: usize = 0xC000_0000;

/// Size of the QSPI linear window
pub const QSPI_LINEAR_SIZE: u32 = 0x2000_0000;

/// Boot device over a memory-mapped flash window
#[derive(Debug)]
pub struct LinearFlash {
    base: *const u8,
    size: u32,
}

impl LinearFlash {
    /// Device over `size` readable bytes at `base`
    ///
    /// # Safety
    ///
    /// `base..base + size` must be readable for the lifetime of the device,
    /// and every load address later handed to [`BootDevice::load`] must be
    /// writable memory that does not overlap the window.
    #[must_use]
    pub const unsafe fn new(base: *const u8, size: u32) -> Self {
        Self { base, size }
    }

    fn check(&self, offset: u32, len: usize) -> Result<(), IoError> {
        let end = u64::from(offset) + len as u64;
        if end > u64::from(self.size) {
            return Err(IoError::OutOfBounds { offset, len });
        }
        Ok(())
    }
}

impl ImageSource for LinearFlash {
    fn copy(&mut self, src_offset: u32, dst: &mut [u8]) -> Result<(), IoError> {
        self.check(src_offset, dst.len())?;
        // SAFETY: the range was checked against the window the constructor
        // guarantees readable; `dst` is a distinct exclusive buffer.
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(src_offset as usize),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
        Ok(())
    }
}

impl BootDevice for LinearFlash {
    fn init(&mut self, mode: BootMode) -> Result<(), IoError> {
        match mode {
            BootMode::Qspi24 | BootMode::Qspi32 => Ok(()),
            _ => Err(IoError::Unsupported),
        }
    }

    fn load(&mut self, src_offset: u32, dest_address: u64, length: u32) -> Result<(), IoError> {
        self.check(src_offset, length as usize)?;
        let dest = usize::try_from(dest_address).map_err(|_| IoError::OutOfBounds {
            offset: src_offset,
            len: length as usize,
        })? as *mut u8;
        // SAFETY: source range checked as in `copy`; the constructor's
        // contract makes validated load addresses writable and disjoint.
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(src_offset as usize),
                dest,
                length as usize,
            );
        }
        Ok(())
    }
}
