//! INQUIRY data

use crate::{ScsiError, STD_INQUIRY_LENGTH};

/// Device type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceType {
    /// Direct access block device (disk)
    DirectAccess = 0x00,
    /// Sequential access device (tape)
    SequentialAccess = 0x01,
    /// Processor device
    Processor = 0x03,
    /// CD/DVD device
    CdDvd = 0x05,
    /// Storage array controller
    StorageArrayController = 0x0C,
    /// Enclosure services device
    EnclosureServices = 0x0D,
    /// Simplified direct access
    SimplifiedDirectAccess = 0x0E,
    /// Host managed zoned block
    ZonedBlock = 0x14,
    /// Well known logical unit
    WellKnown = 0x1E,
    /// Unknown or no device type
    Unknown = 0x1F,
}

impl DeviceType {
    /// Create from peripheral device type byte
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0x1F {
            0x00 => DeviceType::DirectAccess,
            0x01 => DeviceType::SequentialAccess,
            0x03 => DeviceType::Processor,
            0x05 => DeviceType::CdDvd,
            0x0C => DeviceType::StorageArrayController,
            0x0D => DeviceType::EnclosureServices,
            0x0E => DeviceType::SimplifiedDirectAccess,
            0x14 => DeviceType::ZonedBlock,
            0x1E => DeviceType::WellKnown,
            _ => DeviceType::Unknown,
        }
    }

    /// Check if this is a block device
    pub const fn is_block_device(&self) -> bool {
        matches!(
            self,
            DeviceType::DirectAccess | DeviceType::SimplifiedDirectAccess | DeviceType::ZonedBlock
        )
    }
}

fn trimmed(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Standard Inquiry data (36 bytes minimum)
#[derive(Debug, Clone, Copy)]
pub struct InquiryData {
    /// Peripheral device type and qualifier
    pub peripheral: u8,
    /// Removable medium bit
    pub rmb: u8,
    /// Version
    pub version: u8,
    /// Vendor identification (8 bytes)
    pub vendor: [u8; 8],
    /// Product identification (16 bytes)
    pub product: [u8; 16],
    /// Product revision level (4 bytes)
    pub revision: [u8; 4],
}

impl InquiryData {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScsiError> {
        if data.len() < STD_INQUIRY_LENGTH {
            return Err(ScsiError::ShortResponse {
                what: "INQUIRY",
                needed: STD_INQUIRY_LENGTH,
                got: data.len(),
            });
        }

        let mut vendor = [0u8; 8];
        let mut product = [0u8; 16];
        let mut revision = [0u8; 4];

        vendor.copy_from_slice(&data[8..16]);
        product.copy_from_slice(&data[16..32]);
        revision.copy_from_slice(&data[32..36]);

        Ok(Self {
            peripheral: data[0],
            rmb: data[1],
            version: data[2],
            vendor,
            product,
            revision,
        })
    }

    /// Get device type
    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_byte(self.peripheral)
    }

    /// Get peripheral qualifier
    pub const fn peripheral_qualifier(&self) -> u8 {
        (self.peripheral >> 5) & 0x07
    }

    /// Check if device is connected
    pub const fn is_connected(&self) -> bool {
        self.peripheral_qualifier() == 0
    }

    /// Vendor string (trimmed)
    pub fn vendor_str(&self) -> String {
        trimmed(&self.vendor)
    }

    /// Product string (trimmed)
    pub fn product_str(&self) -> String {
        trimmed(&self.product)
    }

    /// Revision string (trimmed)
    pub fn revision_str(&self) -> String {
        trimmed(&self.revision)
    }

    /// Vendor and product joined the way ATA reports a model number
    pub fn model(&self) -> String {
        let vendor = self.vendor_str();
        let product = self.product_str();
        if vendor.is_empty() {
            product
        } else {
            format!("{vendor} {product}")
        }
    }
}

/// VPD page codes
pub mod vpd {
    /// Supported VPD pages
    pub const SUPPORTED_PAGES: u8 = 0x00;
    /// Unit serial number
    pub const UNIT_SERIAL_NUMBER: u8 = 0x80;
    /// Device identification
    pub const DEVICE_IDENTIFICATION: u8 = 0x83;
    /// ATA information
    pub const ATA_INFO: u8 = 0x89;
}

/// Unit Serial Number VPD page (80h)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSerialNumber(pub String);

impl UnitSerialNumber {
    /// Parse the page
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScsiError> {
        if data.len() < 4 || data[1] != vpd::UNIT_SERIAL_NUMBER {
            return Err(ScsiError::ShortResponse {
                what: "Unit Serial Number VPD",
                needed: 4,
                got: data.len(),
            });
        }
        let len = u16::from_be_bytes([data[2], data[3]]) as usize;
        let end = (4 + len).min(data.len());
        Ok(Self(trimmed(&data[4..end])))
    }
}
