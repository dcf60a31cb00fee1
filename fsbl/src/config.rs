//! Boot Loader Configuration
//!
//! Board and policy knobs of one boot attempt. The defaults describe the
//! ZynqMP with the policy selected through cargo features.

use crate::image::address::MemoryMap;
use crate::macros::DebugLevel;

/// Default poll budget for hardware acknowledgements
pub const DEFAULT_POLL_BUDGET: u32 = 1_000_000;

/// Default distance between multiboot images in bytes
pub const DEFAULT_IMAGE_SEARCH_OFFSET: u32 = 0x8000;

/// Boot loader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsblConfig {
    /// Register reads before a power or PMU acknowledgement times out
    pub poll_budget: u32,
    /// Highest multiboot value a fallback may restart into, `None` for no cap
    pub max_fallback_attempts: Option<u32>,
    /// Bytes per multiboot step on raw flash devices
    pub image_search_offset: u32,
    /// Legal load regions
    pub memory_map: MemoryMap,
    /// Diagnostic verbosity
    pub log_level: DebugLevel,
    /// Release R5 targets as soon as their partitions are loaded
    pub early_handoff: bool,
    /// Refuse unencrypted partitions when the encryption-only fuse is blown
    pub force_encryption: bool,
}

impl Default for FsblConfig {
    fn default() -> Self {
        Self {
            poll_budget: DEFAULT_POLL_BUDGET,
            max_fallback_attempts: None,
            image_search_offset: DEFAULT_IMAGE_SEARCH_OFFSET,
            memory_map: MemoryMap::ZYNQMP,
            log_level: DebugLevel::default(),
            early_handoff: cfg!(feature = "early-handoff"),
            force_encryption: cfg!(feature = "force-encryption"),
        }
    }
}
