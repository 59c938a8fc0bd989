//! SSP/STP passthrough
//!
//! Requests are expressed as [`ScsiRequest`] or [`AtaRequest`] and sent to
//! an [`Endpoint`] on a [`Controller`](crate::command::Controller). ATA
//! commands go through [`fallback::issue_ata`], which picks STP or SAT over
//! SSP depending on what the driver accepts.

use core::time::Duration;

use csmi_ata::{AtaCommand, AtaResultRegisters, TransferDirection};
use csmi_scsi::{Cdb, SasAddress, ScsiStatus, SenseBuffer};

use crate::ioctl::passthru::LINK_RATE_NEGOTIATED;
use crate::ioctl::PASSTHRU_TIMEOUT;

pub mod fallback;
pub mod ssp;
pub mod stp;

pub use fallback::issue_ata;
pub use ssp::execute_ssp;
pub use stp::{execute_stp, StpOutcome};

/// Caller data buffer for one command
#[derive(Debug, Default)]
pub enum DataBuffer<'a> {
    /// No data phase
    #[default]
    None,
    /// Device to host
    In(&'a mut [u8]),
    /// Host to device
    Out(&'a [u8]),
}

impl DataBuffer<'_> {
    /// Transfer length
    pub fn len(&self) -> usize {
        match self {
            DataBuffer::None => 0,
            DataBuffer::In(b) => b.len(),
            DataBuffer::Out(b) => b.len(),
        }
    }

    /// No bytes move
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direction of the data phase
    pub fn direction(&self) -> TransferDirection {
        match self {
            DataBuffer::None => TransferDirection::None,
            DataBuffer::In(_) => TransferDirection::In,
            DataBuffer::Out(_) => TransferDirection::Out,
        }
    }

    /// Shorter-lived view of the same buffer
    pub fn reborrow(&mut self) -> DataBuffer<'_> {
        match self {
            DataBuffer::None => DataBuffer::None,
            DataBuffer::In(b) => DataBuffer::In(&mut **b),
            DataBuffer::Out(b) => DataBuffer::Out(*b),
        }
    }

    /// Copy outbound bytes into the request area
    pub(crate) fn stage(&self, area: &mut [u8]) {
        if let DataBuffer::Out(src) = self {
            area[..src.len()].copy_from_slice(src);
        }
    }

    /// Copy inbound bytes back; the caller's buffer is zeroed first
    pub(crate) fn complete(&mut self, area: &[u8], transferred: usize) {
        if let DataBuffer::In(dst) = self {
            dst.fill(0);
            let n = transferred.min(dst.len()).min(area.len());
            dst[..n].copy_from_slice(&area[..n]);
        }
    }
}

/// A SCSI command
#[derive(Debug)]
pub struct ScsiRequest<'a> {
    /// CDB
    pub cdb: Cdb,
    /// Data buffer
    pub data: DataBuffer<'a>,
    /// Command timeout
    pub timeout: Duration,
    /// SCSI status, filled on completion
    pub status: ScsiStatus,
    /// Sense data, filled on completion
    pub sense: SenseBuffer,
}

impl<'a> ScsiRequest<'a> {
    /// Request with the default passthrough timeout
    pub fn new(cdb: Cdb, data: DataBuffer<'a>) -> Self {
        Self {
            cdb,
            data,
            timeout: PASSTHRU_TIMEOUT,
            status: ScsiStatus::Good,
            sense: SenseBuffer::new(),
        }
    }
}

/// An ATA command
#[derive(Debug)]
pub struct AtaRequest<'a> {
    /// Command and task file
    pub command: AtaCommand,
    /// Data buffer
    pub data: DataBuffer<'a>,
    /// Command timeout
    pub timeout: Duration,
    /// Result registers, filled on completion when available
    pub registers: Option<AtaResultRegisters>,
    /// Raw status FIS, STP only
    pub status_fis: Option<[u8; 20]>,
    /// SCR dwords, STP only
    pub scr: Option<[u32; 16]>,
    /// Registers re-encoded as descriptor sense, or the SAT sense
    pub sense: SenseBuffer,
}

impl<'a> AtaRequest<'a> {
    /// Request with the default passthrough timeout
    pub fn new(command: AtaCommand, data: DataBuffer<'a>) -> Self {
        Self {
            command,
            data,
            timeout: PASSTHRU_TIMEOUT,
            registers: None,
            status_fis: None,
            scr: None,
            sense: SenseBuffer::new(),
        }
    }
}

/// Either kind of command
#[derive(Debug)]
pub enum Command<'a> {
    /// SCSI CDB
    Scsi(ScsiRequest<'a>),
    /// ATA task file
    Ata(AtaRequest<'a>),
}

/// Route ATA commands currently take to an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AtaRoute {
    /// STP passthrough
    #[default]
    Stp,
    /// ATA PASS-THROUGH (16) over SSP
    SatOverSsp,
    /// ATA PASS-THROUGH (12) over SSP
    LegacyOverSsp,
}

/// Where a passthrough request is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Phy identifier
    pub phy: u8,
    /// Port identifier
    pub port: u8,
    /// Destination SAS address
    pub sas_address: SasAddress,
    /// SAS LUN
    pub lun: [u8; 8],
    /// Connection rate
    pub connection_rate: u8,
    /// Port multiplier port
    pub pm_port: u8,
    /// Learned ATA route
    pub ata_route: AtaRoute,
}

impl Endpoint {
    /// Endpoint on a phy/port with a destination address
    pub fn new(phy: u8, port: u8, sas_address: SasAddress) -> Self {
        Self {
            phy,
            port,
            sas_address,
            lun: [0; 8],
            connection_rate: LINK_RATE_NEGOTIATED,
            pm_port: 0,
            ata_route: AtaRoute::Stp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_buffer_complete_zeroes() {
        let mut out = [0xAAu8; 8];
        let mut data = DataBuffer::In(&mut out);
        data.complete(&[1, 2, 3, 4, 5, 6, 7, 8], 3);
        assert_eq!(out, [1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_data_buffer_no_transfer() {
        let mut out = [0xAAu8; 4];
        let mut data = DataBuffer::In(&mut out);
        assert_eq!(data.direction(), TransferDirection::In);
        data.complete(&[9; 4], 0);
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn test_data_buffer_stage() {
        let data = DataBuffer::Out(&[7, 8]);
        let mut area = [0u8; 4];
        data.stage(&mut area);
        assert_eq!(area, [7, 8, 0, 0]);
        assert_eq!(data.len(), 2);
    }
}
