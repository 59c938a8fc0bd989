//! CSMI wire structures
//!
//! Byte-exact encodings of the IOCTL header and every payload this crate
//! issues. All multi-byte fields are little-endian except where a payload
//! embeds big-endian SCSI data.

use core::fmt;
use core::time::Duration;

pub mod address;
pub mod driver;
pub mod firmware;
pub mod header;
pub mod passthru;
pub mod phy;
pub mod raid;
pub mod status;

pub use header::{IoctlHeaderLayout, NativeHeader, HEADER_LEN};
pub use status::{Normalized, ReturnCode};

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Information queries
pub const INFO_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-command passthrough timeout
pub const PASSTHRU_TIMEOUT: Duration = Duration::from_secs(15);

/// Firmware download
pub const FIRMWARE_TIMEOUT: Duration = Duration::from_secs(300);

// =============================================================================
// SIGNATURES
// =============================================================================

/// 8-byte sub-API signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 8]);

impl Signature {
    /// Driver-wide queries
    pub const ALL: Signature = Signature(*b"CSMIALL\0");
    /// RAID queries
    pub const RAID: Signature = Signature(*b"CSMIARY\0");
    /// SAS queries and passthrough
    pub const SAS: Signature = Signature(*b"CSMISAS\0");
    /// Phy control
    pub const PHY: Signature = Signature(*b"CSMIPHY\0");

    /// Signature text without the terminator
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        core::str::from_utf8(&self.0[..end]).unwrap_or("?")
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.as_str())
    }
}

// =============================================================================
// CONTROL CODES
// =============================================================================

/// Data direction recorded in the Linux header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Direction {
    /// Driver fills the buffer
    Read = 0,
    /// Driver consumes the buffer
    Write = 1,
}

/// CSMI control codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ControlCode {
    /// Driver information
    DriverInfo = 1,
    /// Controller configuration
    ControllerConfig = 2,
    /// Controller status
    ControllerStatus = 3,
    /// Firmware download
    FirmwareDownload = 4,
    /// RAID information
    RaidInfo = 10,
    /// RAID set configuration
    RaidConfig = 11,
    /// RAID features
    RaidFeatures = 12,
    /// Phy information
    PhyInfo = 20,
    /// Link error counters
    LinkErrors = 22,
    /// SSP passthrough
    SspPassthru = 24,
    /// STP passthrough
    StpPassthru = 25,
    /// SATA signature FIS
    SataSignature = 26,
    /// SAS address to SCSI address
    ScsiAddress = 27,
    /// SCSI address to SAS address
    DeviceAddress = 28,
    /// Connector information
    ConnectorInfo = 30,
}

impl ControlCode {
    /// Raw code
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Signature of the sub-API family
    pub const fn signature(self) -> Signature {
        match self {
            ControlCode::DriverInfo
            | ControlCode::ControllerConfig
            | ControlCode::ControllerStatus
            | ControlCode::FirmwareDownload => Signature::ALL,
            ControlCode::RaidInfo | ControlCode::RaidConfig | ControlCode::RaidFeatures => {
                Signature::RAID
            }
            _ => Signature::SAS,
        }
    }

    /// Timeout class
    pub const fn default_timeout(self) -> Duration {
        match self {
            ControlCode::FirmwareDownload => FIRMWARE_TIMEOUT,
            ControlCode::SspPassthru | ControlCode::StpPassthru => PASSTHRU_TIMEOUT,
            _ => INFO_TIMEOUT,
        }
    }

    /// Default direction
    pub const fn direction(self) -> Direction {
        match self {
            ControlCode::FirmwareDownload
            | ControlCode::SspPassthru
            | ControlCode::StpPassthru => Direction::Write,
            _ => Direction::Read,
        }
    }

    /// Decode a raw code
    pub fn from_u32(code: u32) -> Option<Self> {
        ALL_CODES.iter().copied().find(|c| c.code() == code)
    }
}

const ALL_CODES: &[ControlCode] = &[
    ControlCode::DriverInfo,
    ControlCode::ControllerConfig,
    ControlCode::ControllerStatus,
    ControlCode::FirmwareDownload,
    ControlCode::RaidInfo,
    ControlCode::RaidConfig,
    ControlCode::RaidFeatures,
    ControlCode::PhyInfo,
    ControlCode::LinkErrors,
    ControlCode::SspPassthru,
    ControlCode::StpPassthru,
    ControlCode::SataSignature,
    ControlCode::ScsiAddress,
    ControlCode::DeviceAddress,
    ControlCode::ConnectorInfo,
];

// =============================================================================
// FIELD ACCESSORS
// =============================================================================

pub(crate) fn le_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn le_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub(crate) fn le_u64(buf: &[u8], off: usize) -> u64 {
    (le_u32(buf, off) as u64) | (le_u32(buf, off + 4) as u64) << 32
}

pub(crate) fn put_u16(buf: &mut [u8], off: usize, val: u16) {
    buf[off..off + 2].copy_from_slice(&val.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, val: u32) {
    buf[off..off + 4].copy_from_slice(&val.to_le_bytes());
}

pub(crate) fn bytes8(buf: &[u8], off: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[off..off + 8]);
    out
}

/// NUL-terminated, space-padded ASCII field
pub(crate) fn ascii(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).trim().to_string()
}
