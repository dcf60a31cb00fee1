//! Boot Image Format
//!
//! Layout of a boot image on the boot device, relative to the image offset
//! selected by the multiboot register:
//!
//! ```text
//! +0x000  boot header          (word at 0x98: image header table offset)
//! +IHT    image header table   (64 bytes, see [`table`])
//! +PH     partition headers    (64 bytes each, chained, see [`partition`])
//! +DATA   partition payloads   (word offsets from each partition header)
//! ```
//!
//! Everything is little endian. Reads go through [`ImageSource`]; copying a
//! payload to its load address goes through [`BootDevice::load`].

pub mod address;
pub mod atf;
pub mod checksum;
pub mod linear;
pub mod partition;
pub mod table;
pub mod validate;

use heapless::Vec;
use thiserror_no_std::Error;

use self::checksum::ChecksumError;
use self::partition::{PARTITION_HEADER_WORDS, PartitionHeader};
use self::table::{ImageHeaderTable, MAX_PARTITIONS, PresentDevice};
use crate::boot::BootMode;

/// Offset of the image header table pointer inside the boot header
pub const BOOT_HEADER_IHT_OFFSET: u32 = 0x98;

/// Bytes in either header type
pub const HEADER_BYTES: usize = 64;

/// Boot device access failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IoError {
    /// Read past the end of the device or image
    #[error("read of {len:#x} bytes at {offset:#x} out of bounds")]
    OutOfBounds {
        /// Source offset
        offset: u32,
        /// Requested length
        len: usize,
    },
    /// Driver reported a failure
    #[error("device error {0:#x}")]
    Device(u32),
    /// Operation not provided by the device
    #[error("operation not supported by the boot device")]
    Unsupported,
}

impl IoError {
    /// Numeric status code
    #[must_use]
    pub const fn code(&self) -> u32 {
        0x10
    }
}

/// Image header table failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Reading the table failed
    #[error("{0}")]
    Io(IoError),
    /// Table checksum mismatch
    #[error("image header table checksum: {0}")]
    IhtChecksum(ChecksumError),
    /// Unknown boot partition present device
    #[error("invalid partition present device {0:#x}")]
    InvalidPresentDevice(u32),
    /// Partition count outside `1..=32`
    #[error("invalid partition count {0}")]
    InvalidPartitionCount(u32),
    /// The boot device cannot switch to the secondary device
    #[error("secondary boot device {0:?} not supported")]
    UnsupportedSecondaryDevice(PresentDevice),
}

impl ImageError {
    /// Numeric status code
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::Io(err) => err.code(),
            Self::IhtChecksum(_) => 0x11,
            Self::InvalidPresentDevice(_) => 0x12,
            Self::InvalidPartitionCount(_) => 0x13,
            Self::UnsupportedSecondaryDevice(_) => 0x14,
        }
    }
}

impl From<IoError> for ImageError {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

/// Byte addressable read access to the boot image
pub trait ImageSource {
    /// Fill `dst` from byte `src_offset` of the device
    fn copy(&mut self, src_offset: u32, dst: &mut [u8]) -> Result<(), IoError>;
}

/// A boot device driver: image reads plus payload copies to memory
pub trait BootDevice: ImageSource {
    /// Bring the device up for `mode`
    fn init(&mut self, mode: BootMode) -> Result<(), IoError> {
        let _ = mode;
        Ok(())
    }

    /// Copy `length` bytes from `src_offset` to physical `dest_address`
    fn load(&mut self, src_offset: u32, dest_address: u64, length: u32) -> Result<(), IoError>;

    /// Switch reads to the device holding the partitions
    fn select_secondary(&mut self, device: PresentDevice) -> Result<(), IoError> {
        let _ = device;
        Err(IoError::Unsupported)
    }

    /// Shut the device down before control leaves the boot loader
    fn release(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

/// An image held in memory
#[derive(Debug, Clone, Copy)]
pub struct SliceImage<'a> {
    data: &'a [u8],
}

impl<'a> SliceImage<'a> {
    /// Image backed by `data`
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl ImageSource for SliceImage<'_> {
    fn copy(&mut self, src_offset: u32, dst: &mut [u8]) -> Result<(), IoError> {
        let out_of_bounds = IoError::OutOfBounds {
            offset: src_offset,
            len: dst.len(),
        };
        let start = src_offset as usize;
        let end = start.checked_add(dst.len()).ok_or(out_of_bounds)?;
        let src = self.data.get(start..end).ok_or(out_of_bounds)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Read one little endian word
pub fn read_word<S: ImageSource + ?Sized>(source: &mut S, offset: u32) -> Result<u32, IoError> {
    let mut bytes = [0u8; 4];
    source.copy(offset, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read a 64-byte header as sixteen little endian words
pub fn read_words<S: ImageSource + ?Sized>(
    source: &mut S,
    offset: u32,
) -> Result<[u32; PARTITION_HEADER_WORDS], IoError> {
    let mut bytes = [0u8; HEADER_BYTES];
    source.copy(offset, &mut bytes)?;

    let mut words = [0u32; PARTITION_HEADER_WORDS];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}

/// Byte offset of the image header table for the image at `image_offset`
pub fn read_iht_offset<S: ImageSource + ?Sized>(
    source: &mut S,
    image_offset: u32,
) -> Result<u32, IoError> {
    let pointer = image_offset
        .checked_add(BOOT_HEADER_IHT_OFFSET)
        .ok_or(IoError::OutOfBounds {
            offset: image_offset,
            len: 4,
        })?;
    let iht = read_word(source, pointer)?;
    image_offset.checked_add(iht).ok_or(IoError::OutOfBounds {
        offset: iht,
        len: HEADER_BYTES,
    })
}

/// Byte offset of something `words` words into the image at `image_offset`
pub fn word_offset(image_offset: u32, words: u32) -> Result<u32, IoError> {
    words
        .checked_mul(4)
        .and_then(|bytes| image_offset.checked_add(bytes))
        .ok_or(IoError::OutOfBounds {
            offset: words,
            len: 4,
        })
}

/// Read one partition header without validating it
pub fn read_partition_header<S: ImageSource + ?Sized>(
    source: &mut S,
    offset: u32,
) -> Result<PartitionHeader, IoError> {
    Ok(PartitionHeader::from_words(&read_words(source, offset)?))
}

/// Partition header list of one image
pub type PartitionHeaders = Vec<PartitionHeader, { MAX_PARTITIONS as usize }>;

/// Read every partition header named by `iht`, following the chain of
/// next header offsets. Nothing is validated.
pub fn read_partition_headers<S: ImageSource + ?Sized>(
    source: &mut S,
    image_offset: u32,
    iht: &ImageHeaderTable,
) -> Result<PartitionHeaders, IoError> {
    let mut headers = PartitionHeaders::new();
    let mut next = iht.partition_header_address;

    for _ in 0..iht.partition_count.min(MAX_PARTITIONS) {
        let header = read_partition_header(source, word_offset(image_offset, next)?)?;
        next = header.next_offset;
        // capacity equals the loop bound
        let _ = headers.push(header);
    }
    Ok(headers)
}
