//! Header Checksum
//!
//! Both header types of the boot image end in a checksum word holding the
//! bitwise inverse of the wrapping sum of every preceding word.

use thiserror_no_std::Error;

/// Checksum validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChecksumError {
    /// Fewer than one data word plus the checksum word
    #[error("header of {len} words is too short to carry a checksum")]
    TooShort {
        /// Number of words supplied
        len: usize,
    },
    /// Stored checksum does not match the computed one
    #[error("checksum mismatch: computed {computed:#010x}, stored {stored:#010x}")]
    Mismatch {
        /// Inverse of the sum of the data words
        computed: u32,
        /// Checksum word read from the header
        stored: u32,
    },
}

/// Result type for checksum operations
pub type ChecksumResult<T> = Result<T, ChecksumError>;

/// Inverse of the wrapping sum of `words`
#[must_use]
pub fn compute_checksum(words: &[u32]) -> u32 {
    !words.iter().fold(0u32, |sum, word| sum.wrapping_add(*word))
}

/// Check that the last word of `words` is the checksum of the others
pub fn validate_checksum(words: &[u32]) -> ChecksumResult<()> {
    let Some((stored, data)) = words.split_last() else {
        return Err(ChecksumError::TooShort { len: 0 });
    };
    if data.is_empty() {
        return Err(ChecksumError::TooShort { len: words.len() });
    }

    let computed = compute_checksum(data);
    if computed == *stored {
        Ok(())
    } else {
        Err(ChecksumError::Mismatch {
            computed,
            stored: *stored,
        })
    }
}

/// Overwrite the last word of `words` with the checksum of the others
pub fn seal(words: &mut [u32]) {
    if let Some((last, data)) = words.split_last_mut() {
        *last = compute_checksum(data);
    }
}
