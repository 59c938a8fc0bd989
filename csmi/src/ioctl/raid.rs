//! RAID payloads (signature `CSMIARY`)
//!
//! ```text
//! RAID_CONFIG buffer
//! ┌────────┬───────────────────────┬──────────┬──────────┬─────┐
//! │ header │ fixed fields (36)     │ drive 0  │ drive 1  │ ... │
//! │        │ index, capacity, ...  │ (136)    │ (136)    │     │
//! └────────┴───────────────────────┴──────────┴──────────┴─────┘
//! ```
//!
//! The number of drive entries is never taken from `bDriveCount` alone; it
//! is clamped to what the returned length and the allocation can hold.

use bitflags::bitflags;
use csmi_scsi::SasAddress;
use static_assertions::const_assert_eq;

use super::{ascii, bytes8, le_u16, le_u32, le_u64, put_u32};
use crate::error::{check_len, CsmiResult};

/// `CSMI_SAS_RAID_INFO` size
pub const RAID_INFO_LEN: usize = 100;
/// Fixed part of `CSMI_SAS_RAID_CONFIG`
pub const RAID_CONFIG_FIXED_LEN: usize = 36;
/// One `CSMI_SAS_RAID_DRIVES` entry
pub const RAID_DRIVE_LEN: usize = 136;
/// `CSMI_SAS_RAID_FEATURES` size
pub const RAID_FEATURES_LEN: usize = 2916;

const RAID_TYPE_OFFSET: usize = 60;
const RAID_TYPE_LEN: usize = 108;
const RAID_TYPE_SLOTS: usize = 24;
const RAID_TYPE_END: u8 = 0xFF;

// =============================================================================
// RAID INFO
// =============================================================================

/// RAID capability summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaidInfo {
    /// Configured RAID sets
    pub num_raid_sets: u32,
    /// Drives a set may hold
    pub max_drives_per_set: u32,
    /// Maximum RAID sets
    pub max_raid_sets: u32,
    /// Maximum RAID types
    pub max_raid_types: u8,
    /// Minimum set size in blocks
    pub min_raid_set_blocks: u64,
    /// Maximum set size in blocks
    pub max_raid_set_blocks: u64,
    /// Maximum physical drives
    pub max_physical_drives: u32,
    /// Maximum extents
    pub max_extents: u32,
    /// Maximum modules
    pub max_modules: u32,
    /// Maximum transformation memory
    pub max_transformation_memory: u32,
    /// Configuration change count
    pub change_count: u32,
}

impl RaidInfo {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("raid info", buf, RAID_INFO_LEN)?;
        Ok(Self {
            num_raid_sets: le_u32(buf, 0),
            max_drives_per_set: le_u32(buf, 4),
            max_raid_sets: le_u32(buf, 8),
            max_raid_types: buf[12],
            min_raid_set_blocks: le_u64(buf, 20),
            max_raid_set_blocks: le_u64(buf, 28),
            max_physical_drives: le_u32(buf, 36),
            max_extents: le_u32(buf, 40),
            max_modules: le_u32(buf, 44),
            max_transformation_memory: le_u32(buf, 48),
            change_count: le_u32(buf, 52),
        })
    }
}

// =============================================================================
// RAID CONFIG
// =============================================================================

/// How a drive participates in a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveUsage {
    /// Not part of the set
    NotUsed,
    /// Member
    Member,
    /// Hot spare
    Spare,
    /// Spare currently rebuilding into the set
    SpareActive,
    /// SRT cache device
    SrtCache,
    /// SRT data device
    SrtData,
    /// Undefined value
    Unknown(u8),
}

impl DriveUsage {
    /// Decode the raw value
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => DriveUsage::NotUsed,
            1 => DriveUsage::Member,
            2 => DriveUsage::Spare,
            3 => DriveUsage::SpareActive,
            4 => DriveUsage::SrtCache,
            5 => DriveUsage::SrtData,
            other => DriveUsage::Unknown(other),
        }
    }

    /// Drive is a physical device worth reporting
    pub fn is_countable(&self) -> bool {
        matches!(
            self,
            DriveUsage::Member
                | DriveUsage::Spare
                | DriveUsage::SpareActive
                | DriveUsage::SrtCache
                | DriveUsage::SrtData
        )
    }
}

/// Physical drive type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    /// Unknown
    Unknown,
    /// Single-port SAS
    SingleSas,
    /// Dual-port SAS
    DualSas,
    /// SATA
    Sata,
    /// SATA behind a port selector
    SataPortSelector,
    /// Other
    Other(u8),
}

impl DriveType {
    /// Decode the raw value
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => DriveType::Unknown,
            1 => DriveType::SingleSas,
            2 => DriveType::DualSas,
            3 => DriveType::Sata,
            4 => DriveType::SataPortSelector,
            other => DriveType::Other(other),
        }
    }

    /// Drive speaks ATA
    pub fn is_sata(&self) -> bool {
        matches!(self, DriveType::Sata | DriveType::SataPortSelector)
    }
}

/// One drive entry of a RAID set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidDrive {
    /// Model
    pub model: String,
    /// Firmware revision
    pub firmware: String,
    /// Serial number
    pub serial_number: String,
    /// SAS address (zero on some SATA-attached members)
    pub sas_address: SasAddress,
    /// SAS LUN
    pub sas_lun: [u8; 8],
    /// Drive status
    pub status: u8,
    /// Usage within the set
    pub usage: DriveUsage,
    /// Logical block size
    pub block_size: u16,
    /// Drive type
    pub drive_type: DriveType,
    /// Drive index
    pub drive_index: u32,
    /// Total user blocks
    pub total_user_blocks: u64,
}

impl RaidDrive {
    fn decode(e: &[u8]) -> Self {
        Self {
            model: ascii(&e[0..40]),
            firmware: ascii(&e[40..48]),
            serial_number: ascii(&e[48..88]),
            sas_address: SasAddress(bytes8(e, 88)),
            sas_lun: bytes8(e, 96),
            status: e[104],
            usage: DriveUsage::from_byte(e[105]),
            block_size: le_u16(e, 106),
            drive_type: DriveType::from_byte(e[108]),
            drive_index: le_u32(e, 124),
            total_user_blocks: le_u64(e, 128),
        }
    }

    /// Entry carries enough to locate the drive without a phy scan
    pub fn is_identifiable(&self) -> bool {
        !self.sas_address.is_zero() || !(self.model.is_empty() && self.serial_number.is_empty())
    }
}

/// One RAID set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidConfig {
    /// Set index
    pub index: u32,
    /// Capacity in MB
    pub capacity: u32,
    /// Stripe size in KB
    pub stripe_size: u32,
    /// RAID level
    pub raid_type: u8,
    /// Set status
    pub status: u8,
    /// Status detail
    pub information: u8,
    /// Drive count reported by the driver
    pub reported_drive_count: u8,
    /// Data type
    pub data_type: u8,
    /// Failure code
    pub failure_code: u32,
    /// Change count
    pub change_count: u32,
    /// Drive entries actually decoded
    pub drives: Vec<RaidDrive>,
}

/// Most drive entries a set can report; `bDriveCount` is one byte
pub const MAX_RAID_DRIVES: u32 = u8::MAX as u32;

/// Payload length needed for a set of `max_drives`, capped at
/// [`MAX_RAID_DRIVES`] entries
pub fn raid_config_len(max_drives: u32) -> usize {
    RAID_CONFIG_FIXED_LEN + max_drives.min(MAX_RAID_DRIVES) as usize * RAID_DRIVE_LEN
}

/// Fill the request fields of a RAID config payload
pub fn encode_raid_config_request(payload: &mut [u8], index: u32) {
    put_u32(payload, 0, index);
}

impl RaidConfig {
    /// Decode with a bounds-checked drive count
    ///
    /// `returned_len` is the payload length the driver reported and
    /// `capacity` the number of entries allocated.
    pub fn decode(buf: &[u8], returned_len: usize, capacity: u32) -> CsmiResult<Self> {
        check_len("raid config", buf, RAID_CONFIG_FIXED_LEN)?;
        let reported = buf[15];
        let available =
            returned_len.min(buf.len()).saturating_sub(RAID_CONFIG_FIXED_LEN) / RAID_DRIVE_LEN;
        let count = (reported as usize).min(available).min(capacity as usize);
        if count < reported as usize {
            log::debug!(
                "raid set {}: driver reported {} drives, decoding {}",
                le_u32(buf, 0),
                reported,
                count
            );
        }

        let drives = buf[RAID_CONFIG_FIXED_LEN..]
            .chunks_exact(RAID_DRIVE_LEN)
            .take(count)
            .map(RaidDrive::decode)
            .collect();

        Ok(Self {
            index: le_u32(buf, 0),
            capacity: le_u32(buf, 4),
            stripe_size: le_u32(buf, 8),
            raid_type: buf[12],
            status: buf[13],
            information: buf[14],
            reported_drive_count: reported,
            data_type: buf[16],
            failure_code: le_u32(buf, 28),
            change_count: le_u32(buf, 32),
            drives,
        })
    }

    /// Drives whose usage makes them reportable
    pub fn countable_drives(&self) -> impl Iterator<Item = &RaidDrive> {
        self.drives.iter().filter(|d| d.usage.is_countable())
    }
}

// =============================================================================
// RAID FEATURES
// =============================================================================

bitflags! {
    /// `uFeatures`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RaidFeatureFlags: u32 {
        /// Online transformation
        const TRANSFORMATION = 0x01;
        /// Rebuild
        const REBUILD = 0x02;
        /// Split mirror
        const SPLIT_MIRROR = 0x04;
        /// Merge mirror
        const MERGE_MIRROR = 0x08;
        /// LUN renumbering
        const LUN_RENUMBER = 0x10;
        /// Surface scan
        const SURFACE_SCAN = 0x20;
        /// Spares shared between sets
        const SPARES_SHARED = 0x40;
    }
}

/// One supported RAID level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaidTypeDescription {
    /// RAID level
    pub raid_type: u8,
    /// Supported stripe sizes, bit n = 2^n KB
    pub stripe_size_map: u32,
}

/// RAID feature summary
///
/// Only the leading fields and the RAID type table are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidFeatures {
    /// Feature flags
    pub features: RaidFeatureFlags,
    /// Default transformation priority
    pub default_transform_priority: u8,
    /// Transformation priority
    pub transform_priority: u8,
    /// Default rebuild priority
    pub default_rebuild_priority: u8,
    /// Rebuild priority
    pub rebuild_priority: u8,
    /// Default surface scan priority
    pub default_surface_scan_priority: u8,
    /// Surface scan priority
    pub surface_scan_priority: u8,
    /// Transformation rules
    pub transformation_rules: u32,
    /// Supported RAID levels
    pub raid_types: Vec<RaidTypeDescription>,
}

impl RaidFeatures {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("raid features", buf, RAID_FEATURES_LEN)?;
        let raid_types = buf[RAID_TYPE_OFFSET..RAID_TYPE_OFFSET + RAID_TYPE_SLOTS * RAID_TYPE_LEN]
            .chunks_exact(RAID_TYPE_LEN)
            .take_while(|t| t[0] != RAID_TYPE_END)
            .map(|t| RaidTypeDescription {
                raid_type: t[0],
                stripe_size_map: le_u32(t, 8),
            })
            .collect();
        Ok(Self {
            features: RaidFeatureFlags::from_bits_retain(le_u32(buf, 0)),
            default_transform_priority: buf[4],
            transform_priority: buf[5],
            default_rebuild_priority: buf[6],
            rebuild_priority: buf[7],
            default_surface_scan_priority: buf[8],
            surface_scan_priority: buf[9],
            transformation_rules: le_u32(buf, 12),
            raid_types,
        })
    }
}

const_assert_eq!(RAID_DRIVE_LEN, 128 + 8);
const_assert_eq!(RAID_TYPE_OFFSET + RAID_TYPE_SLOTS * RAID_TYPE_LEN, 2652);
