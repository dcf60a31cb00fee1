//! ATF Handoff Parameters
//!
//! The trusted firmware that runs after the boot loader needs to know which
//! A53 applications to start. The boot loader leaves that list in a fixed
//! layout block and publishes its address through a PMU storage register.
//!
//! ```text
//! 0x00 magic "XLNX"
//! 0x04 entry count
//! 0x08 entry[0] { entry_point: u64, flags: u64 }
//! ...
//! 0x78 entry[7]
//! ```

use static_assertions::const_assert_eq;

use super::partition::PartitionHeader;
use crate::cpu::{CpuId, CpuKind, ExecState};

/// Entries the block can hold
pub const MAX_ATF_ENTRIES: usize = 8;

/// Magic value at the start of the block
pub const ATF_MAGIC: [u8; 4] = *b"XLNX";

/// Flag: AArch32 application
pub const FLAG_EXEC_AARCH32: u64 = 1 << 0;
/// Flag: big endian application
pub const FLAG_BIG_ENDIAN: u64 = 1 << 1;
/// Flag: secure world application
pub const FLAG_SECURE: u64 = 1 << 2;
/// Shift of the exception level field
pub const FLAG_EL_SHIFT: u32 = 3;
/// Shift of the A53 core field
pub const FLAG_CPU_SHIFT: u32 = 5;

/// One application for the trusted firmware to start
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtfEntry {
    /// Entry point
    pub entry_point: u64,
    /// Execution flags
    pub flags: u64,
}

/// Parameter block read by the trusted firmware
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtfHandoffParams {
    /// `ATF_MAGIC` once at least one entry exists
    pub magic: [u8; 4],
    /// Valid entries
    pub num_entries: u32,
    /// Entry table
    pub entries: [AtfEntry; MAX_ATF_ENTRIES],
}

const_assert_eq!(core::mem::size_of::<AtfEntry>(), 16);
const_assert_eq!(core::mem::size_of::<AtfHandoffParams>(), 8 + 16 * MAX_ATF_ENTRIES);
const_assert_eq!(core::mem::align_of::<AtfHandoffParams>(), 8);

impl Default for AtfHandoffParams {
    fn default() -> Self {
        Self::new()
    }
}

impl AtfHandoffParams {
    /// Empty block
    #[must_use]
    pub const fn new() -> Self {
        Self {
            magic: [0; 4],
            num_entries: 0,
            entries: [AtfEntry {
                entry_point: 0,
                flags: 0,
            }; MAX_ATF_ENTRIES],
        }
    }

    /// Valid entries
    #[must_use]
    pub fn entries(&self) -> &[AtfEntry] {
        let len = (self.num_entries as usize).min(MAX_ATF_ENTRIES);
        &self.entries[..len]
    }

    /// Append an entry. Returns `false` when the table is full.
    pub fn add_entry(&mut self, entry_point: u64, flags: u64) -> bool {
        let index = self.num_entries as usize;
        if index >= MAX_ATF_ENTRIES {
            return false;
        }
        if index == 0 {
            self.magic = ATF_MAGIC;
        }
        self.entries[index] = AtfEntry { entry_point, flags };
        self.num_entries += 1;
        true
    }

    /// Record the A53 application a partition starts.
    ///
    /// Applications for EL3 are the trusted firmware itself and are not
    /// listed. Returns whether an entry was added.
    pub fn add_partition(&mut self, header: &PartitionHeader) -> bool {
        let Some(flags) = partition_flags(header) else {
            return false;
        };
        if header.attributes.target_el() == 3 {
            return false;
        }
        self.add_entry(header.exec_address, flags)
    }
}

/// ATF flags for an A53 partition, `None` for other destinations
#[must_use]
pub fn partition_flags(header: &PartitionHeader) -> Option<u64> {
    let attrs = header.attributes;
    let CpuKind::Apu { core } = attrs.destination_cpu()?.kind() else {
        return None;
    };

    let mut flags = u64::from(attrs.target_el()) << FLAG_EL_SHIFT;
    flags |= u64::from(core) << FLAG_CPU_SHIFT;
    if attrs.exec_state() == ExecState::Aarch32 {
        flags |= FLAG_EXEC_AARCH32;
    }
    if attrs.is_big_endian() {
        flags |= FLAG_BIG_ENDIAN;
    }
    if attrs.is_secure() {
        flags |= FLAG_SECURE;
    }
    Some(flags)
}

/// Whether `header` starts a new A53 application relative to the
/// partition before it
#[must_use]
pub fn starts_application(header: &PartitionHeader, previous: Option<&PartitionHeader>) -> bool {
    let cpu = header.attributes.destination_cpu();
    if !cpu.is_some_and(CpuId::is_a53) {
        return false;
    }
    previous.is_none_or(|prev| {
        prev.attributes.destination_cpu() != cpu || prev.exec_address != header.exec_address
    })
}
