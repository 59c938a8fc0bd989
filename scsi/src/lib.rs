//! # CSMI SCSI
//!
//! SCSI primitives needed to drive devices through CSMI SSP passthrough.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  cdb      │  CDB container (≤ 40 bytes) and builders                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  sat      │  ATA PASS-THROUGH (16) and (12) encodings               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  sense    │  Fixed / descriptor sense, ATA Status Return descriptor │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  inquiry  │  Standard INQUIRY and Unit Serial Number VPD            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  sas      │  SAS address, device type, link rate                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod cdb;
pub mod inquiry;
pub mod sas;
pub mod sat;
pub mod sense;

pub use cdb::{Cdb, CdbBuilder};
pub use inquiry::{DeviceType, InquiryData, UnitSerialNumber};
pub use sas::{SasAddress, SasDeviceType, SasLinkRate};
pub use sense::{SenseBuffer, SenseSummary};

// =============================================================================
// SCSI CONSTANTS
// =============================================================================

/// Maximum CDB length carried by SSP passthrough (16 + 24 additional bytes)
pub const MAX_CDB_LENGTH: usize = 40;

/// Maximum sense data length
pub const MAX_SENSE_LENGTH: usize = 252;

/// Standard inquiry data length
pub const STD_INQUIRY_LENGTH: usize = 36;

// =============================================================================
// SCSI OPERATION CODES
// =============================================================================

/// SCSI operation codes
pub mod opcode {
    /// Test Unit Ready
    pub const TEST_UNIT_READY: u8 = 0x00;
    /// Request Sense
    pub const REQUEST_SENSE: u8 = 0x03;
    /// Inquiry
    pub const INQUIRY: u8 = 0x12;
    /// Read Capacity (10)
    pub const READ_CAPACITY_10: u8 = 0x25;
    /// Read (10)
    pub const READ_10: u8 = 0x28;
    /// Write (10)
    pub const WRITE_10: u8 = 0x2A;
    /// Write Buffer
    pub const WRITE_BUFFER: u8 = 0x3B;
    /// Log Sense
    pub const LOG_SENSE: u8 = 0x4D;
    /// ATA Pass-Through (16)
    pub const ATA_PASS_THROUGH_16: u8 = 0x85;
    /// Read (16)
    pub const READ_16: u8 = 0x88;
    /// Write (16)
    pub const WRITE_16: u8 = 0x8A;
    /// Service Action In (16)
    pub const SERVICE_ACTION_IN_16: u8 = 0x9E;
    /// Report Luns
    pub const REPORT_LUNS: u8 = 0xA0;
    /// ATA Pass-Through (12)
    pub const ATA_PASS_THROUGH_12: u8 = 0xA1;

    /// Read Capacity (16) service action
    pub const SA_READ_CAPACITY_16: u8 = 0x10;
}

// =============================================================================
// SCSI STATUS CODES
// =============================================================================

/// SCSI status byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScsiStatus {
    /// Command completed successfully
    Good = 0x00,
    /// Check Condition status
    CheckCondition = 0x02,
    /// Condition Met
    ConditionMet = 0x04,
    /// Target is busy
    Busy = 0x08,
    /// Reservation Conflict
    ReservationConflict = 0x18,
    /// Task Set Full
    TaskSetFull = 0x28,
    /// ACA Active
    AcaActive = 0x30,
    /// Task Aborted
    TaskAborted = 0x40,
}

impl ScsiStatus {
    /// Create from status byte
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0x7E {
            0x00 => ScsiStatus::Good,
            0x02 => ScsiStatus::CheckCondition,
            0x04 => ScsiStatus::ConditionMet,
            0x08 => ScsiStatus::Busy,
            0x18 => ScsiStatus::ReservationConflict,
            0x28 => ScsiStatus::TaskSetFull,
            0x30 => ScsiStatus::AcaActive,
            0x40 => ScsiStatus::TaskAborted,
            _ => ScsiStatus::CheckCondition,
        }
    }

    /// Check if status indicates success
    pub const fn is_good(&self) -> bool {
        matches!(self, ScsiStatus::Good | ScsiStatus::ConditionMet)
    }

    /// Check if sense data is available
    pub const fn has_sense(&self) -> bool {
        matches!(self, ScsiStatus::CheckCondition)
    }
}

// =============================================================================
// SENSE KEY AND CODES
// =============================================================================

/// SCSI sense keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SenseKey {
    /// No error or no sense information
    NoSense = 0x00,
    /// Recovered error
    RecoveredError = 0x01,
    /// Device not ready
    NotReady = 0x02,
    /// Medium error
    MediumError = 0x03,
    /// Hardware error
    HardwareError = 0x04,
    /// Illegal request
    IllegalRequest = 0x05,
    /// Unit attention
    UnitAttention = 0x06,
    /// Write protected
    DataProtect = 0x07,
    /// Blank check
    BlankCheck = 0x08,
    /// Vendor specific
    VendorSpecific = 0x09,
    /// Copy aborted
    CopyAborted = 0x0A,
    /// Aborted command
    AbortedCommand = 0x0B,
    /// Equal (obsolete)
    Equal = 0x0C,
    /// Volume overflow
    VolumeOverflow = 0x0D,
    /// Miscompare
    Miscompare = 0x0E,
    /// Completed
    Completed = 0x0F,
}

impl SenseKey {
    /// Create from sense key value
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0x0F {
            0x00 => SenseKey::NoSense,
            0x01 => SenseKey::RecoveredError,
            0x02 => SenseKey::NotReady,
            0x03 => SenseKey::MediumError,
            0x04 => SenseKey::HardwareError,
            0x05 => SenseKey::IllegalRequest,
            0x06 => SenseKey::UnitAttention,
            0x07 => SenseKey::DataProtect,
            0x08 => SenseKey::BlankCheck,
            0x09 => SenseKey::VendorSpecific,
            0x0A => SenseKey::CopyAborted,
            0x0B => SenseKey::AbortedCommand,
            0x0C => SenseKey::Equal,
            0x0D => SenseKey::VolumeOverflow,
            0x0E => SenseKey::Miscompare,
            _ => SenseKey::Completed,
        }
    }

    /// Get human-readable description
    pub const fn description(&self) -> &'static str {
        match self {
            SenseKey::NoSense => "No sense",
            SenseKey::RecoveredError => "Recovered error",
            SenseKey::NotReady => "Not ready",
            SenseKey::MediumError => "Medium error",
            SenseKey::HardwareError => "Hardware error",
            SenseKey::IllegalRequest => "Illegal request",
            SenseKey::UnitAttention => "Unit attention",
            SenseKey::DataProtect => "Data protect",
            SenseKey::BlankCheck => "Blank check",
            SenseKey::VendorSpecific => "Vendor specific",
            SenseKey::CopyAborted => "Copy aborted",
            SenseKey::AbortedCommand => "Aborted command",
            SenseKey::Equal => "Equal",
            SenseKey::VolumeOverflow => "Volume overflow",
            SenseKey::Miscompare => "Miscompare",
            SenseKey::Completed => "Completed",
        }
    }
}

/// Additional Sense Code (ASC) values
pub mod asc {
    /// No additional sense
    pub const NO_ADDITIONAL_SENSE: u8 = 0x00;
    /// Logical unit not ready
    pub const LU_NOT_READY: u8 = 0x04;
    /// Invalid command operation code
    pub const INVALID_OPCODE: u8 = 0x20;
    /// Invalid field in CDB
    pub const INVALID_FIELD_IN_CDB: u8 = 0x24;
    /// Logical unit not supported
    pub const LU_NOT_SUPPORTED: u8 = 0x25;
    /// Internal target failure
    pub const INTERNAL_TARGET_FAILURE: u8 = 0x44;
}

/// Additional Sense Code Qualifier (ASCQ) values
pub mod ascq {
    /// No qualifier
    pub const NONE: u8 = 0x00;
    /// ATA pass-through information available (with ASC 00h)
    pub const ATA_PASS_THROUGH_INFO: u8 = 0x1D;
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// SCSI error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScsiError {
    /// CDB longer than the transport can carry
    #[error("CDB of {0} bytes exceeds {max} bytes", max = MAX_CDB_LENGTH)]
    CdbTooLong(usize),
    /// Empty CDB
    #[error("empty CDB")]
    EmptyCdb,
    /// Command needs addressing the chosen encoding cannot express
    #[error("ATA command {command:#04x} needs 48-bit addressing, not expressible in a 12-byte CDB")]
    NeedsExtendedCdb {
        /// ATA opcode
        command: u8,
    },
    /// Check condition (with sense data)
    #[error("check condition: {} (ASC={asc:#04X}, ASCQ={ascq:#04X})", .sense_key.description())]
    CheckCondition {
        /// Sense key
        sense_key: SenseKey,
        /// ASC
        asc: u8,
        /// ASCQ
        ascq: u8,
    },
    /// Non-GOOD status returned without sense data
    #[error("SCSI status {0:?} without sense data")]
    Status(ScsiStatus),
    /// Response shorter than its structure
    #[error("{what} response too short: need {needed} bytes, got {got}")]
    ShortResponse {
        /// Structure name
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes returned
        got: usize,
    },
}

// =============================================================================
// TESTS
// =============================================================================
