//! SSP and STP passthrough payloads
//!
//! ```text
//! SSP: header | parameters (72) | status (268) | data ...
//! STP: header | parameters (44) | status (92)  | data ...
//! ```

use bitflags::bitflags;
use csmi_ata::fis::REGISTER_FIS_LEN;
use csmi_scsi::{SasAddress, MAX_CDB_LENGTH};
use static_assertions::const_assert_eq;

use super::{le_u32, put_u32};
use crate::error::{check_len, CsmiError, CsmiResult};

/// SSP parameters size
pub const SSP_PARAMS_LEN: usize = 72;
/// SSP status size
pub const SSP_STATUS_LEN: usize = 268;
/// SSP payload before data
pub const SSP_FIXED_LEN: usize = SSP_PARAMS_LEN + SSP_STATUS_LEN;
/// STP parameters size
pub const STP_PARAMS_LEN: usize = 44;
/// STP status size
pub const STP_STATUS_LEN: usize = 92;
/// STP payload before data
pub const STP_FIXED_LEN: usize = STP_PARAMS_LEN + STP_STATUS_LEN;

/// CDB bytes carried in the base field
pub const BASE_CDB_LEN: usize = 16;
/// Additional CDB field size
pub const ADDITIONAL_CDB_LEN: usize = 24;
/// SSP response data field size
pub const SSP_RESPONSE_LEN: usize = 256;
/// SCR dwords returned by STP
pub const SCR_COUNT: usize = 16;

/// Let the driver negotiate the link rate
pub const LINK_RATE_NEGOTIATED: u8 = 0;

/// `bConnectionStatus` of a connection the target accepted
pub const OPEN_ACCEPT: u8 = 0;

bitflags! {
    /// `uFlags` of SSP passthrough
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SspFlags: u32 {
        /// Data in
        const READ = 0x01;
        /// Data out
        const WRITE = 0x02;
        /// No data
        const UNSPECIFIED = 0x04;
    }
}

bitflags! {
    /// `uFlags` of STP passthrough
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StpFlags: u32 {
        /// Data in
        const READ = 0x01;
        /// Data out
        const WRITE = 0x02;
        /// No data
        const UNSPECIFIED = 0x04;
        /// PIO protocol
        const PIO = 0x10;
        /// DMA protocol
        const DMA = 0x20;
        /// Packet protocol
        const PACKET = 0x40;
        /// Queued DMA
        const DMA_QUEUED = 0x80;
        /// Execute device diagnostic
        const EXECUTE_DIAG = 0x100;
        /// Device reset
        const RESET_DEVICE = 0x200;
    }
}

/// `bDataPresent` of an SSP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SspDataPresent {
    /// Nothing
    NoData,
    /// SSP response data
    ResponseData,
    /// Sense data
    SenseData,
    /// Undefined value
    Other(u8),
}

impl SspDataPresent {
    fn from_byte(b: u8) -> Self {
        match b {
            0 => SspDataPresent::NoData,
            1 => SspDataPresent::ResponseData,
            2 => SspDataPresent::SenseData,
            other => SspDataPresent::Other(other),
        }
    }
}

// =============================================================================
// SSP
// =============================================================================

/// SSP request parameters
#[derive(Debug, Clone, Copy)]
pub struct SspParameters<'a> {
    /// Phy identifier
    pub phy: u8,
    /// Port identifier
    pub port: u8,
    /// Connection rate
    pub connection_rate: u8,
    /// Destination SAS address
    pub destination: SasAddress,
    /// Logical unit
    pub lun: [u8; 8],
    /// CDB, at most 40 bytes
    pub cdb: &'a [u8],
    /// Direction flags
    pub flags: SspFlags,
    /// Data transfer length
    pub data_len: u32,
}

impl SspParameters<'_> {
    /// Encode; bytes past 16 go to the additional CDB, length in dwords
    pub fn encode(&self, p: &mut [u8]) -> CsmiResult<()> {
        if self.cdb.is_empty() {
            return Err(csmi_scsi::ScsiError::EmptyCdb.into());
        }
        if self.cdb.len() > MAX_CDB_LENGTH {
            return Err(csmi_scsi::ScsiError::CdbTooLong(self.cdb.len()).into());
        }
        check_len("ssp parameters", p, SSP_PARAMS_LEN)?;
        p[0] = self.phy;
        p[1] = self.port;
        p[2] = self.connection_rate;
        p[4..12].copy_from_slice(&self.destination.0);
        p[12..20].copy_from_slice(&self.lun);

        let base = self.cdb.len().min(BASE_CDB_LEN);
        p[20] = base as u8;
        p[24..24 + base].copy_from_slice(&self.cdb[..base]);
        let extra = &self.cdb[base..];
        p[21] = extra.len().div_ceil(4) as u8;
        p[44..44 + extra.len()].copy_from_slice(extra);

        put_u32(p, 40, self.flags.bits());
        put_u32(p, 68, self.data_len);
        Ok(())
    }
}

/// SSP completion status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SspStatus {
    /// Connection status
    pub connection_status: u8,
    /// SSP status
    pub ssp_status: u8,
    /// What the response field carries
    pub data_present: SspDataPresent,
    /// SCSI status
    pub status: u8,
    /// Valid response bytes
    pub response_length: u16,
    /// Response or sense bytes
    pub response: Vec<u8>,
    /// Data bytes transferred
    pub data_bytes: u32,
}

impl SspStatus {
    /// Decode the status block; `s` starts at the status block
    pub fn decode(s: &[u8]) -> CsmiResult<Self> {
        check_len("ssp status", s, SSP_STATUS_LEN)?;
        let response_length = u16::from_be_bytes([s[6], s[7]]);
        let valid = (response_length as usize).min(SSP_RESPONSE_LEN);
        Ok(Self {
            connection_status: s[0],
            ssp_status: s[1],
            data_present: SspDataPresent::from_byte(s[4]),
            status: s[5],
            response_length,
            response: s[8..8 + valid].to_vec(),
            data_bytes: le_u32(s, 264),
        })
    }

    /// Sense bytes, when the response carries sense data
    pub fn sense(&self) -> Option<&[u8]> {
        (self.data_present == SspDataPresent::SenseData).then_some(self.response.as_slice())
    }
}

// =============================================================================
// STP
// =============================================================================

/// STP request parameters
#[derive(Debug, Clone, Copy)]
pub struct StpParameters {
    /// Phy identifier
    pub phy: u8,
    /// Port identifier
    pub port: u8,
    /// Connection rate
    pub connection_rate: u8,
    /// Destination SAS address
    pub destination: SasAddress,
    /// Host-to-Device command FIS
    pub command_fis: [u8; REGISTER_FIS_LEN],
    /// Protocol and direction flags
    pub flags: StpFlags,
    /// Data transfer length
    pub data_len: u32,
}

impl StpParameters {
    /// Encode into the parameter block
    pub fn encode(&self, p: &mut [u8]) -> CsmiResult<()> {
        check_len("stp parameters", p, STP_PARAMS_LEN)?;
        p[0] = self.phy;
        p[1] = self.port;
        p[2] = self.connection_rate;
        p[4..12].copy_from_slice(&self.destination.0);
        p[16..36].copy_from_slice(&self.command_fis);
        put_u32(p, 36, self.flags.bits());
        put_u32(p, 40, self.data_len);
        Ok(())
    }
}

/// STP completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StpStatus {
    /// Connection status
    pub connection_status: u8,
    /// Returned status FIS
    pub status_fis: [u8; REGISTER_FIS_LEN],
    /// SATA status/control registers
    pub scr: [u32; SCR_COUNT],
    /// Data bytes transferred
    pub data_bytes: u32,
}

impl StpStatus {
    /// Decode the status block; `s` starts at the status block
    pub fn decode(s: &[u8]) -> CsmiResult<Self> {
        check_len("stp status", s, STP_STATUS_LEN)?;
        let mut status_fis = [0u8; REGISTER_FIS_LEN];
        status_fis.copy_from_slice(&s[4..24]);
        let mut scr = [0u32; SCR_COUNT];
        for (i, r) in scr.iter_mut().enumerate() {
            *r = le_u32(s, 24 + i * 4);
        }
        Ok(Self {
            connection_status: s[0],
            status_fis,
            scr,
            data_bytes: le_u32(s, 88),
        })
    }
}

/// Data length that fits the 32-bit length fields
pub(crate) fn data_len_u32(len: usize) -> CsmiResult<u32> {
    u32::try_from(len).map_err(|_| CsmiError::BadParameter(format!("transfer of {len} bytes")))
}

const_assert_eq!(SSP_PARAMS_LEN, 44 + ADDITIONAL_CDB_LEN + 4);
const_assert_eq!(SSP_STATUS_LEN, 8 + SSP_RESPONSE_LEN + 4);
const_assert_eq!(STP_STATUS_LEN, 4 + REGISTER_FIS_LEN + SCR_COUNT * 4 + 4);
const_assert_eq!(BASE_CDB_LEN + ADDITIONAL_CDB_LEN, MAX_CDB_LENGTH);
