//! Image Header Table
//!
//! The single 64-byte table that describes the whole boot image:
//!
//! ```text
//! 0x00 version
//! 0x04 partition count
//! 0x08 first partition header (words)
//! 0x0C reserved
//! 0x10 auth certificate offset (words)
//! 0x14 boot partition present device
//! 0x18 reserved ...
//! 0x3C checksum
//! ```

use super::checksum::validate_checksum;
use super::{ImageError, ImageSource, read_words};

/// Words in the image header table
pub const IHT_WORDS: usize = 16;

/// Most partitions a boot image may carry
pub const MAX_PARTITIONS: u32 = 32;

/// Device holding the partitions of the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentDevice {
    /// Same device as the image header table
    Same,
    /// QSPI, 24-bit addressing
    Qspi24,
    /// QSPI, 32-bit addressing
    Qspi32,
    /// NAND
    Nand,
    /// SD controller 0
    Sd0,
    /// SD controller 1
    Sd1,
    /// SD controller 1, level shifted
    SdLs,
    /// eMMC
    Mmc,
    /// USB
    Usb,
    /// Ethernet
    Ethernet,
    /// PCIe
    Pcie,
    /// SATA
    Sata,
}

impl PresentDevice {
    /// Decode the present device word
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Same,
            1 => Self::Qspi24,
            2 => Self::Qspi32,
            3 => Self::Nand,
            4 => Self::Sd0,
            5 => Self::Sd1,
            6 => Self::SdLs,
            7 => Self::Mmc,
            8 => Self::Usb,
            9 => Self::Ethernet,
            0xA => Self::Pcie,
            0xB => Self::Sata,
            _ => return None,
        })
    }
}

/// Decoded image header table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeaderTable {
    /// Format version
    pub version: u32,
    /// Number of partitions
    pub partition_count: u32,
    /// Word offset of the first partition header, relative to the image
    pub partition_header_address: u32,
    /// Word offset of the authentication certificate
    pub ac_offset: u32,
    /// Raw boot partition present device
    pub partition_present_device: u32,
    /// Checksum
    pub checksum: u32,
}

impl ImageHeaderTable {
    /// Decode a table from its words. No validation.
    #[must_use]
    pub const fn from_words(w: &[u32; IHT_WORDS]) -> Self {
        Self {
            version: w[0],
            partition_count: w[1],
            partition_header_address: w[2],
            ac_offset: w[4],
            partition_present_device: w[5],
            checksum: w[15],
        }
    }
}

/// Where the partitions of a valid table live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IhtStatus {
    /// On the device the table was read from
    Primary,
    /// On another device the caller has to switch to
    SecondaryBootDevice(PresentDevice),
}

/// Read the image header table at byte `offset` of `source` and validate it
pub fn read_and_validate_iht<S: ImageSource + ?Sized>(
    source: &mut S,
    offset: u32,
) -> Result<(ImageHeaderTable, IhtStatus), ImageError> {
    let words: [u32; IHT_WORDS] = read_words(source, offset)?;
    validate_iht(&words)
}

/// Validate the words of an image header table
pub fn validate_iht(words: &[u32; IHT_WORDS]) -> Result<(ImageHeaderTable, IhtStatus), ImageError> {
    validate_checksum(words).map_err(ImageError::IhtChecksum)?;
    let table = ImageHeaderTable::from_words(words);

    let device = PresentDevice::from_raw(table.partition_present_device)
        .ok_or(ImageError::InvalidPresentDevice(table.partition_present_device))?;

    if !(1..=MAX_PARTITIONS).contains(&table.partition_count) {
        return Err(ImageError::InvalidPartitionCount(table.partition_count));
    }

    let status = match device {
        PresentDevice::Same => IhtStatus::Primary,
        other => IhtStatus::SecondaryBootDevice(other),
    };
    Ok((table, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::checksum::{ChecksumError, seal};

    fn table(count: u32, device: u32) -> [u32; IHT_WORDS] {
        let mut words = [0u32; IHT_WORDS];
        words[0] = 0x0102_0000;
        words[1] = count;
        words[2] = 0x440;
        words[5] = device;
        seal(&mut words);
        words
    }

    #[test]
    fn partition_count_bounds() {
        for count in [1, 32] {
            assert!(validate_iht(&table(count, 0)).is_ok(), "{count}");
        }
        for count in [0, 33] {
            assert_eq!(
                validate_iht(&table(count, 0)),
                Err(ImageError::InvalidPartitionCount(count))
            );
        }
    }

    #[test]
    fn checksum_checked_first() {
        let mut words = table(0, 0x55);
        words[3] ^= 1;
        assert!(matches!(
            validate_iht(&words),
            Err(ImageError::IhtChecksum(ChecksumError::Mismatch { .. }))
        ));
    }

    #[test]
    fn secondary_device_is_not_an_error() {
        let (iht, status) = validate_iht(&table(3, 3)).unwrap();
        assert_eq!(iht.partition_count, 3);
        assert_eq!(iht.partition_header_address, 0x440);
        assert_eq!(status, IhtStatus::SecondaryBootDevice(PresentDevice::Nand));

        let (_, status) = validate_iht(&table(3, 4)).unwrap();
        assert_eq!(status, IhtStatus::SecondaryBootDevice(PresentDevice::Sd0));

        let (_, status) = validate_iht(&table(3, 0)).unwrap();
        assert_eq!(status, IhtStatus::Primary);
    }

    #[test]
    fn present_device_encoding() {
        let expected = [
            PresentDevice::Same,
            PresentDevice::Qspi24,
            PresentDevice::Qspi32,
            PresentDevice::Nand,
            PresentDevice::Sd0,
            PresentDevice::Sd1,
            PresentDevice::SdLs,
            PresentDevice::Mmc,
            PresentDevice::Usb,
            PresentDevice::Ethernet,
            PresentDevice::Pcie,
            PresentDevice::Sata,
        ];
        for (raw, device) in expected.into_iter().enumerate() {
            assert_eq!(PresentDevice::from_raw(raw as u32), Some(device));
        }
        assert_eq!(PresentDevice::from_raw(0xC), None);
    }

    #[test]
    fn unknown_present_device() {
        assert_eq!(
            validate_iht(&table(2, 0xC)),
            Err(ImageError::InvalidPresentDevice(0xC))
        );
    }
}
