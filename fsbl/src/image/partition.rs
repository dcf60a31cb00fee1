//! Partition Headers
//!
//! One 64-byte header per partition, sixteen little-endian words:
//!
//! ```text
//! 0x00 encrypted length (words)     0x20 data offset (words)
//! 0x04 unencrypted length (words)   0x24 attributes
//! 0x08 total length (words)         0x28 section count
//! 0x0C next header offset (words)   0x2C checksum offset (words)
//! 0x10 execution address (64-bit)   0x30 image header offset (words)
//! 0x18 load address (64-bit)        0x34 auth certificate offset (words)
//!                                   0x38 iv
//!                                   0x3C checksum
//! ```

use static_assertions::const_assert_eq;

use super::checksum::{self, ChecksumResult};
use crate::cpu::{CpuId, DeviceId, ExecState, VectorLocation};

/// Words in a partition header
pub const PARTITION_HEADER_WORDS: usize = 16;

const_assert_eq!(PARTITION_HEADER_WORDS * 4, 64);

/// Partition owner field
pub const OWNER_MASK: u32 = 0x3_0000;
/// Authentication certificate present
pub const RSA_SIGNATURE_MASK: u32 = 0x8000;
/// Checksum type field
pub const CHECKSUM_TYPE_MASK: u32 = 0x7000;
/// Partition is encrypted
pub const ENCRYPTION_MASK: u32 = 0x80;
/// Block size field
pub const BLOCK_SIZE_MASK: u32 = 0x70_0000;
/// Big endian payload
pub const ENDIAN_MASK: u32 = 0x4_0000;
/// Target exception level field
pub const TARGET_EL_MASK: u32 = 0x6;
/// TrustZone secure
pub const TRUSTZONE_MASK: u32 = 0x1;

/// Who loads the partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionOwner {
    /// This boot loader
    Fsbl,
    /// A later stage (U-Boot)
    UBoot,
    /// Reserved encoding
    Reserved(u32),
}

/// Integrity check applied to the partition payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    /// No checksum
    None,
    /// MD5
    Md5,
    /// SHA-2
    Sha2,
    /// SHA-3
    Sha3,
    /// Reserved encoding
    Reserved(u32),
}

impl ChecksumType {
    /// Whether the boot loader accepts this checksum type
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::None | Self::Md5 | Self::Sha3)
    }
}

/// Partition attribute word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionAttributes(pub u32);

impl PartitionAttributes {
    /// Raw attribute word
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Owner field
    #[must_use]
    pub const fn owner(self) -> PartitionOwner {
        match self.0 & OWNER_MASK {
            0 => PartitionOwner::Fsbl,
            0x1_0000 => PartitionOwner::UBoot,
            other => PartitionOwner::Reserved(other),
        }
    }

    /// Authentication certificate present
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        self.0 & RSA_SIGNATURE_MASK != 0
    }

    /// Payload is encrypted
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        self.0 & ENCRYPTION_MASK != 0
    }

    /// Checksum type field
    #[must_use]
    pub const fn checksum_type(self) -> ChecksumType {
        match self.0 & CHECKSUM_TYPE_MASK {
            0 => ChecksumType::None,
            0x1000 => ChecksumType::Md5,
            0x2000 => ChecksumType::Sha2,
            0x3000 => ChecksumType::Sha3,
            other => ChecksumType::Reserved(other),
        }
    }

    /// Raw destination CPU field
    #[must_use]
    pub const fn destination_cpu_bits(self) -> u32 {
        self.0 & crate::cpu::DEST_CPU_MASK
    }

    /// Destination CPU, `None` for encodings past the PMU
    #[must_use]
    pub const fn destination_cpu(self) -> Option<CpuId> {
        CpuId::from_attr(self.0)
    }

    /// Raw destination device field
    #[must_use]
    pub const fn destination_device_bits(self) -> u32 {
        self.0 & DeviceId::MASK
    }

    /// Destination device, `None` for encodings past the PMU
    #[must_use]
    pub const fn destination_device(self) -> Option<DeviceId> {
        DeviceId::from_attr(self.0)
    }

    /// A53 execution state
    #[must_use]
    pub const fn exec_state(self) -> ExecState {
        ExecState::from_attr(self.0)
    }

    /// Exception vector location
    #[must_use]
    pub const fn vector_location(self) -> VectorLocation {
        VectorLocation::from_attr(self.0)
    }

    /// Payload is big endian
    #[must_use]
    pub const fn is_big_endian(self) -> bool {
        self.0 & ENDIAN_MASK != 0
    }

    /// Target exception level, 0..=3
    #[must_use]
    pub const fn target_el(self) -> u32 {
        (self.0 & TARGET_EL_MASK) >> 1
    }

    /// TrustZone secure
    #[must_use]
    pub const fn is_secure(self) -> bool {
        self.0 & TRUSTZONE_MASK != 0
    }

    /// Block size field
    #[must_use]
    pub const fn block_size(self) -> u32 {
        (self.0 & BLOCK_SIZE_MASK) >> 20
    }
}

/// Decoded partition header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionHeader {
    /// Encrypted data length in words
    pub encrypted_len: u32,
    /// Unencrypted data length in words, zero for execute-in-place
    pub unencrypted_len: u32,
    /// Total length in words, including any certificate
    pub total_len: u32,
    /// Offset of the next header in words
    pub next_offset: u32,
    /// Execution (entry) address
    pub exec_address: u64,
    /// Load address
    pub load_address: u64,
    /// Offset of the payload in words, relative to the image start
    pub data_offset: u32,
    /// Attribute word
    pub attributes: PartitionAttributes,
    /// Number of sections
    pub section_count: u32,
    /// Offset of the payload checksum in words
    pub checksum_offset: u32,
    /// Offset of the owning image header in words
    pub image_header_offset: u32,
    /// Offset of the authentication certificate in words
    pub ac_offset: u32,
    /// Initialization vector word
    pub iv: u32,
    /// Header checksum
    pub checksum: u32,
}

impl PartitionHeader {
    /// Decode a header from its sixteen words
    #[must_use]
    pub const fn from_words(w: &[u32; PARTITION_HEADER_WORDS]) -> Self {
        Self {
            encrypted_len: w[0],
            unencrypted_len: w[1],
            total_len: w[2],
            next_offset: w[3],
            exec_address: (w[4] as u64) | ((w[5] as u64) << 32),
            load_address: (w[6] as u64) | ((w[7] as u64) << 32),
            data_offset: w[8],
            attributes: PartitionAttributes(w[9]),
            section_count: w[10],
            checksum_offset: w[11],
            image_header_offset: w[12],
            ac_offset: w[13],
            iv: w[14],
            checksum: w[15],
        }
    }

    /// Encode the header back to its sixteen words
    #[must_use]
    pub const fn to_words(&self) -> [u32; PARTITION_HEADER_WORDS] {
        [
            self.encrypted_len,
            self.unencrypted_len,
            self.total_len,
            self.next_offset,
            self.exec_address as u32,
            (self.exec_address >> 32) as u32,
            self.load_address as u32,
            (self.load_address >> 32) as u32,
            self.data_offset,
            self.attributes.0,
            self.section_count,
            self.checksum_offset,
            self.image_header_offset,
            self.ac_offset,
            self.iv,
            self.checksum,
        ]
    }

    /// Check the header checksum
    pub fn validate_checksum(&self) -> ChecksumResult<()> {
        checksum::validate_checksum(&self.to_words())
    }

    /// Execute-in-place partition: nothing is copied
    #[must_use]
    pub const fn is_xip(&self) -> bool {
        self.unencrypted_len == 0
    }

    /// Destination CPU with `NONE` resolved to `running` for partitions
    /// headed to the processing system
    #[must_use]
    pub fn resolved_cpu(&self, running: CpuId) -> Option<CpuId> {
        match (
            self.attributes.destination_cpu(),
            self.attributes.destination_device(),
        ) {
            (Some(CpuId::None), Some(DeviceId::None | DeviceId::Ps)) => Some(running),
            (cpu, _) => cpu,
        }
    }
}
