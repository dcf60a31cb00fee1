//! Zero FSBL Library
//!
//! First stage boot loader core for a mixed Cortex-A53 / Cortex-R5 SoC.
//! This library parses and validates the on-flash boot image, loads its
//! partitions one at a time and hands every loaded application to the core
//! it was built for.
//!
//! # Architecture
//!
//! The loader is a four stage state machine driven from a single boot core:
//! - Stage 1: processor, reset reason and status register initialization
//! - Stage 2: boot device selection, image header table and partition headers
//! - Stage 3: partition validation and copy, one partition per pass
//! - Stage 4: power up, reset vector update and release of every target core
//!
//! Failures at any stage end in the lock-down path, which records the status
//! code and either restarts from the next multiboot image or halts.
//!
//! # Hardware Access
//!
//! All register traffic goes through the [`platform::Platform`] trait and all
//! image reads through [`image::BootDevice`]. The same boot flow runs against
//! real MMIO on target and against [`platform::sim::SimPlatform`] in tests.
//!
//! # Safety
//!
//! Unsafe code is confined to the MMIO accessors and the target entry point.
//! Every unsafe block carries a `SAFETY:` comment.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::panic)]
#![warn(clippy::unwrap_used)]

#[doc(hidden)]
pub use log as __log;

pub mod macros;

pub mod arch;
pub mod boot;
pub mod config;
pub mod cpu;
pub mod image;
pub mod platform;

pub use boot::{BootOutcome, Fsbl, FsblInstance};
pub use config::FsblConfig;

use thiserror_no_std::Error;

use crate::boot::InitError;
use crate::boot::handoff::HandoffError;
use crate::cpu::power::PowerError;
use crate::image::validate::PartitionError;
use crate::image::{ImageError, IoError};

/// Core boot loader error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsblError {
    /// Processor, reset or boot mode initialization failed
    #[error("initialization failed: {0}")]
    Init(InitError),
    /// Boot device read failed
    #[error("boot device error: {0}")]
    Io(IoError),
    /// Image header table or boot header is malformed
    #[error("image header error: {0}")]
    Image(ImageError),
    /// A partition header failed validation
    #[error("partition error: {0}")]
    Partition(PartitionError),
    /// Power, clock or reset sequencing failed
    #[error("cpu sequencing error: {0}")]
    Power(PowerError),
    /// The running CPU cannot take the requested handoff
    #[error("handoff error: {0}")]
    Handoff(HandoffError),
}

impl FsblError {
    /// Numeric status code recorded in the error status register.
    ///
    /// The stage machine adds the stage offset before writing it out.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::Init(err) => err.code(),
            Self::Io(err) => err.code(),
            Self::Image(err) => err.code(),
            Self::Partition(err) => err.code(),
            Self::Power(err) => err.code(),
            Self::Handoff(err) => err.code(),
        }
    }
}

impl From<InitError> for FsblError {
    fn from(err: InitError) -> Self {
        Self::Init(err)
    }
}

impl From<IoError> for FsblError {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl From<ImageError> for FsblError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Io(io) => Self::Io(io),
            other => Self::Image(other),
        }
    }
}

impl From<PartitionError> for FsblError {
    fn from(err: PartitionError) -> Self {
        Self::Partition(err)
    }
}

impl From<PowerError> for FsblError {
    fn from(err: PowerError) -> Self {
        Self::Power(err)
    }
}

impl From<HandoffError> for FsblError {
    fn from(err: HandoffError) -> Self {
        Self::Handoff(err)
    }
}

/// Result type for boot loader operations
pub type FsblResult<T> = Result<T, FsblError>;
