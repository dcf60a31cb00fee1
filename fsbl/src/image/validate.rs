//! Partition Header Validation
//!
//! Every partition header is checked right before its partition loads. The
//! checks run in a fixed order and each has its own failure:
//!
//! 1. APU-only reset: partitions not built for an A53 are skipped
//! 2. enc-only devices reject unencrypted partitions
//! 3. `NONE` destination resolves to the running CPU for PS partitions
//! 4. execute-in-place: no authentication or encryption, entry in the QSPI
//!    window (remaining length and placement checks do not apply)
//! 5. length relationship for the authentication/encryption combination
//! 6. load and execution addresses legal for the destination
//! 7. an R5 may not place A53 code below the reserved DDR floor
//! 8. checksum type
//! 9. destination CPU encoding
//! 10. lockstep cross-assignment
//! 11. destination device encoding

use core::cmp::Ordering;

use thiserror_no_std::Error;

use super::address::MemoryMap;
use super::checksum::ChecksumError;
use super::partition::PartitionHeader;
use crate::boot::ResetReason;
use crate::cpu::{CpuId, DeviceId};

/// Partition header validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// Header checksum mismatch
    #[error("partition header checksum: {0}")]
    HeaderChecksum(ChecksumError),
    /// Execute-in-place partition carries authentication or encryption
    #[error("execute-in-place partition cannot be authenticated or encrypted")]
    XipAuthEncrypt,
    /// Execute-in-place entry point outside the QSPI linear window
    #[error("execute-in-place address {0:#x} outside the QSPI window")]
    XipExecAddress(u64),
    /// Length relationship broken
    #[error(
        "length mismatch: unencrypted {unencrypted:#x}, encrypted {encrypted:#x}, total {total:#x}"
    )]
    Length {
        /// Unencrypted length in words
        unencrypted: u32,
        /// Encrypted length in words
        encrypted: u32,
        /// Total length in words
        total: u32,
    },
    /// Load address illegal for the destination
    #[error("load address {address:#x} illegal for {cpu:?}")]
    LoadAddress {
        /// Offending address
        address: u64,
        /// Resolved destination CPU
        cpu: CpuId,
    },
    /// Entry point illegal for the destination
    #[error("execution address {address:#x} illegal for {cpu:?}")]
    ExecAddress {
        /// Offending address
        address: u64,
        /// Resolved destination CPU
        cpu: CpuId,
    },
    /// A53 partition in the DDR range an R5 boot loader reserves
    #[error("A53 load address {0:#x} overlaps the R5 reserved region")]
    R5ReservedRegion(u64),
    /// Unsupported checksum type
    #[error("checksum type {0:#x} not supported")]
    InvalidChecksumType(u32),
    /// Destination CPU encoding past the PMU
    #[error("destination cpu {0:#x} invalid")]
    InvalidCpuType(u32),
    /// Lockstep and split R5 mixed
    #[error("{running:?} cannot load a partition for {destination:?}")]
    LockstepCpuType {
        /// CPU running the boot loader
        running: CpuId,
        /// Destination of the partition
        destination: CpuId,
    },
    /// Destination device encoding past the PMU
    #[error("destination device {0:#x} invalid")]
    InvalidDestDevice(u32),
    /// Unencrypted partition on an encryption-only device
    #[error("unencrypted partition rejected: device requires encryption")]
    EncryptionRequired,
    /// Payload larger than the TCM it targets
    #[error("{length:#x} bytes do not fit the TCM at {address:#x}")]
    TcmOverflow {
        /// Load address
        address: u64,
        /// Payload length in bytes
        length: u32,
    },
}

impl PartitionError {
    /// Numeric status code
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::HeaderChecksum(_) => 0x20,
            Self::XipAuthEncrypt => 0x21,
            Self::XipExecAddress(_) => 0x22,
            Self::Length { .. } => 0x23,
            Self::LoadAddress { .. } => 0x24,
            Self::R5ReservedRegion(_) => 0x25,
            Self::InvalidChecksumType(_) => 0x26,
            Self::InvalidCpuType(_) => 0x27,
            Self::LockstepCpuType { .. } => 0x28,
            Self::InvalidDestDevice(_) => 0x29,
            Self::EncryptionRequired => 0x2A,
            Self::TcmOverflow { .. } => 0x2B,
            Self::ExecAddress { .. } => 0x2C,
        }
    }
}

/// Result type for partition validation
pub type PartitionResult<T> = Result<T, PartitionError>;

/// Outcome of a successful validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionVerdict {
    /// Load the partition
    Load,
    /// Not for this boot loader in the current reset mode
    Skip,
}

/// Board and device policy the checks run against
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy<'a> {
    /// Legal load regions
    pub memory_map: &'a MemoryMap,
    /// Only encrypted partitions may load
    pub encryption_required: bool,
}

/// Validate `header` for a boot loader running on `running_cpu` after a
/// `reset` type reset
pub fn validate_partition_header(
    header: &PartitionHeader,
    running_cpu: CpuId,
    reset: ResetReason,
    policy: &ValidationPolicy<'_>,
) -> PartitionResult<PartitionVerdict> {
    let attrs = header.attributes;
    let map = policy.memory_map;

    if reset == ResetReason::ApuOnly && !attrs.destination_cpu().is_some_and(CpuId::is_a53) {
        return Ok(PartitionVerdict::Skip);
    }

    if policy.encryption_required && !attrs.is_encrypted() {
        return Err(PartitionError::EncryptionRequired);
    }

    let cpu = header.resolved_cpu(running_cpu);
    // unknown encodings are range checked as application cores, then rejected below
    let cpu_for_range = cpu.unwrap_or(CpuId::None);
    let device = attrs.destination_device().unwrap_or(DeviceId::None);

    if header.is_xip() {
        if attrs.is_authenticated() || attrs.is_encrypted() {
            return Err(PartitionError::XipAuthEncrypt);
        }
        if !map.qspi_linear.contains(header.exec_address) {
            return Err(PartitionError::XipExecAddress(header.exec_address));
        }
    } else {
        check_lengths(header, attrs.is_authenticated(), attrs.is_encrypted())?;

        if !map.is_valid_address(header.load_address, cpu_for_range, device) {
            return Err(PartitionError::LoadAddress {
                address: header.load_address,
                cpu: cpu_for_range,
            });
        }

        if !map.is_valid_address(header.exec_address, cpu_for_range, device) {
            return Err(PartitionError::ExecAddress {
                address: header.exec_address,
                cpu: cpu_for_range,
            });
        }

        if running_cpu.is_r5()
            && cpu.is_some_and(CpuId::is_a53)
            && header.load_address < map.r5_reserved_floor
        {
            return Err(PartitionError::R5ReservedRegion(header.load_address));
        }
    }

    if !attrs.checksum_type().is_supported() {
        return Err(PartitionError::InvalidChecksumType(
            attrs.bits() & super::partition::CHECKSUM_TYPE_MASK,
        ));
    }

    let Some(cpu) = cpu else {
        return Err(PartitionError::InvalidCpuType(attrs.destination_cpu_bits()));
    };

    let mixed = matches!(
        (running_cpu, cpu),
        (CpuId::R5_0, CpuId::R5Lockstep) | (CpuId::R5Lockstep, CpuId::R5_0 | CpuId::R5_1)
    );
    if mixed {
        return Err(PartitionError::LockstepCpuType {
            running: running_cpu,
            destination: cpu,
        });
    }

    if attrs.destination_device().is_none() {
        return Err(PartitionError::InvalidDestDevice(
            attrs.destination_device_bits(),
        ));
    }

    Ok(PartitionVerdict::Load)
}

/// Check the word lengths against the authentication/encryption combination.
///
/// | auth | enc | required                       |
/// |------|-----|--------------------------------|
/// | no   | no  | unencrypted == encrypted == total |
/// | yes  | no  | unencrypted == encrypted < total  |
/// | no   | yes | unencrypted < encrypted == total  |
/// | yes  | yes | unencrypted < encrypted < total   |
pub fn check_lengths(
    header: &PartitionHeader,
    authenticated: bool,
    encrypted: bool,
) -> PartitionResult<()> {
    let unenc_vs_enc = header.unencrypted_len.cmp(&header.encrypted_len);
    let enc_vs_total = header.encrypted_len.cmp(&header.total_len);

    let expected = (
        if encrypted { Ordering::Less } else { Ordering::Equal },
        if authenticated { Ordering::Less } else { Ordering::Equal },
    );

    if (unenc_vs_enc, enc_vs_total) == expected {
        Ok(())
    } else {
        Err(PartitionError::Length {
            unencrypted: header.unencrypted_len,
            encrypted: header.encrypted_len,
            total: header.total_len,
        })
    }
}
