//! CSMI operations
//!
//! One method per control code. Each allocates an aligned buffer for the
//! header and payload, fills the request fields, issues it, and turns the
//! driver's return code into a `CsmiResult` before decoding.

use csmi_scsi::SasAddress;

use crate::buffer::AlignedBuffer;
use crate::error::CsmiResult;
use crate::ioctl::address::{
    decode_device_address, decode_scsi_address, encode_device_address_request,
    encode_scsi_address_request, ScsiAddress, GET_DEVICE_ADDRESS_LEN, GET_SCSI_ADDRESS_LEN,
};
use crate::ioctl::driver::{
    ControllerConfig, ControllerStatus, DriverInfo, CONTROLLER_CONFIG_LEN, CONTROLLER_STATUS_LEN,
    DRIVER_INFO_LEN,
};
use crate::ioctl::firmware::{
    encode_firmware_request, FirmwareDownloadStatus, FirmwareFlags, FIRMWARE_DOWNLOAD_LEN,
};
use crate::ioctl::phy::{
    encode_link_errors_request, ConnectorInfo, LinkErrors, PhyInfo, SataSignature,
    CONNECTOR_INFO_LEN, LINK_ERRORS_LEN, PHY_INFO_LEN, PHY_INFO_SLACK, SATA_SIGNATURE_LEN,
};
use crate::ioctl::raid::{
    encode_raid_config_request, raid_config_len, RaidConfig, RaidFeatures, RaidInfo,
    MAX_RAID_DRIVES, RAID_FEATURES_LEN, RAID_INFO_LEN,
};
use crate::ioctl::{ControlCode, HEADER_LEN};
use crate::transport::{
    execute, CommandTimer, CsmiTransport, IoctlRequest, TransportOutcome, Verbosity,
};

/// A controller reached through one OS handle
#[derive(Debug)]
pub struct Controller {
    transport: Box<dyn CsmiTransport>,
    number: u32,
    verbosity: Verbosity,
}

impl Controller {
    /// Wrap an open transport
    pub fn new(transport: Box<dyn CsmiTransport>, number: u32) -> Self {
        Self {
            transport,
            number,
            verbosity: Verbosity::Off,
        }
    }

    /// Set the dump threshold
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Controller number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Dump threshold
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub(crate) fn transport(&self) -> &dyn CsmiTransport {
        self.transport.as_ref()
    }

    /// Issue a prepared buffer; the return code is not yet interpreted
    pub(crate) fn issue_raw(
        &self,
        code: ControlCode,
        buf: &mut AlignedBuffer,
        configure: impl FnOnce(IoctlRequest<'_>) -> IoctlRequest<'_>,
        timer: Option<&mut CommandTimer>,
    ) -> CsmiResult<TransportOutcome> {
        let req = IoctlRequest::new(code, buf.as_mut_slice())?
            .controller(self.number)
            .verbosity(self.verbosity);
        execute(self.transport(), configure(req), timer)
    }

    /// Issue a zeroed payload of `len` bytes and normalize the return code
    fn query(
        &self,
        code: ControlCode,
        len: usize,
        fill: impl FnOnce(&mut [u8]),
    ) -> CsmiResult<(AlignedBuffer, TransportOutcome)> {
        let mut buf = AlignedBuffer::zeroed(HEADER_LEN + len)?;
        fill(&mut buf.as_mut_slice()[HEADER_LEN..]);
        let outcome = self.issue_raw(code, &mut buf, |r| r, None)?;
        outcome.return_code.into_result()?;
        Ok((buf, outcome))
    }

    // =========================================================================
    // CSMIALL
    // =========================================================================

    /// Driver name, description and versions
    pub fn get_driver_info(&self) -> CsmiResult<DriverInfo> {
        let (buf, _) = self.query(ControlCode::DriverInfo, DRIVER_INFO_LEN, |_| {})?;
        DriverInfo::decode(&buf.as_slice()[HEADER_LEN..])
    }

    /// Controller configuration
    pub fn get_controller_config(&self) -> CsmiResult<ControllerConfig> {
        let (buf, _) = self.query(ControlCode::ControllerConfig, CONTROLLER_CONFIG_LEN, |_| {})?;
        ControllerConfig::decode(&buf.as_slice()[HEADER_LEN..])
    }

    /// Controller status
    pub fn get_controller_status(&self) -> CsmiResult<ControllerStatus> {
        let (buf, _) = self.query(ControlCode::ControllerStatus, CONTROLLER_STATUS_LEN, |_| {})?;
        ControllerStatus::decode(&buf.as_slice()[HEADER_LEN..])
    }

    /// Send a firmware image to the controller
    ///
    /// Only the header and the download structure are cleared; the image
    /// is copied in once behind them.
    pub fn firmware_download(
        &self,
        image: &[u8],
        flags: FirmwareFlags,
    ) -> CsmiResult<FirmwareDownloadStatus> {
        let image_len = crate::ioctl::passthru::data_len_u32(image.len())?;
        let mut buf = AlignedBuffer::zeroed(HEADER_LEN + FIRMWARE_DOWNLOAD_LEN + image.len())?;
        {
            let payload = &mut buf.as_mut_slice()[HEADER_LEN..];
            payload[FIRMWARE_DOWNLOAD_LEN..].copy_from_slice(image);
            encode_firmware_request(payload, image_len, flags);
        }
        log::info!(
            "controller {}: firmware download of {} bytes ({:?})",
            self.number,
            image.len(),
            flags
        );
        let outcome = self.issue_raw(ControlCode::FirmwareDownload, &mut buf, |r| r, None)?;
        outcome.return_code.into_result()?;
        FirmwareDownloadStatus::decode(&buf.as_slice()[HEADER_LEN..])
    }

    // =========================================================================
    // CSMIARY
    // =========================================================================

    /// RAID capability summary
    pub fn get_raid_info(&self) -> CsmiResult<RaidInfo> {
        let (buf, _) = self.query(ControlCode::RaidInfo, RAID_INFO_LEN, |_| {})?;
        RaidInfo::decode(&buf.as_slice()[HEADER_LEN..])
    }

    /// One RAID set with room for `max_drives` drive entries
    pub fn get_raid_config(&self, index: u32, max_drives: u32) -> CsmiResult<RaidConfig> {
        let max_drives = max_drives.min(MAX_RAID_DRIVES);
        let len = raid_config_len(max_drives);
        let (buf, outcome) = self.query(ControlCode::RaidConfig, len, |p| {
            encode_raid_config_request(p, index)
        })?;
        RaidConfig::decode(&buf.as_slice()[HEADER_LEN..], outcome.returned_len, max_drives)
    }

    /// RAID feature summary
    pub fn get_raid_features(&self) -> CsmiResult<RaidFeatures> {
        let (buf, _) = self.query(ControlCode::RaidFeatures, RAID_FEATURES_LEN, |_| {})?;
        RaidFeatures::decode(&buf.as_slice()[HEADER_LEN..])
    }

    // =========================================================================
    // CSMISAS
    // =========================================================================

    /// Phy table
    pub fn get_phy_info(&self) -> CsmiResult<PhyInfo> {
        // Some drivers write past the nominal structure
        let (buf, _) = self.query(ControlCode::PhyInfo, PHY_INFO_LEN + PHY_INFO_SLACK, |_| {})?;
        PhyInfo::decode(&buf.as_slice()[HEADER_LEN..HEADER_LEN + PHY_INFO_LEN])
    }

    /// Link error counters, optionally resetting them
    pub fn get_link_errors(&self, phy: u8, reset: bool) -> CsmiResult<LinkErrors> {
        let (buf, _) = self.query(ControlCode::LinkErrors, LINK_ERRORS_LEN, |p| {
            encode_link_errors_request(p, phy, reset)
        })?;
        LinkErrors::decode(&buf.as_slice()[HEADER_LEN..])
    }

    /// Signature FIS of the SATA device on `phy`
    pub fn get_sata_signature(&self, phy: u8) -> CsmiResult<SataSignature> {
        let (buf, _) = self.query(ControlCode::SataSignature, SATA_SIGNATURE_LEN, |p| p[0] = phy)?;
        SataSignature::decode(&buf.as_slice()[HEADER_LEN..])
    }

    /// OS SCSI address of a SAS endpoint
    pub fn get_scsi_address(&self, sas: &SasAddress, lun: &[u8; 8]) -> CsmiResult<ScsiAddress> {
        let (buf, _) = self.query(ControlCode::ScsiAddress, GET_SCSI_ADDRESS_LEN, |p| {
            encode_scsi_address_request(p, sas, lun)
        })?;
        decode_scsi_address(&buf.as_slice()[HEADER_LEN..])
    }

    /// SAS address and LUN of an OS SCSI address
    pub fn get_device_address(&self, addr: &ScsiAddress) -> CsmiResult<(SasAddress, [u8; 8])> {
        let (buf, _) = self.query(ControlCode::DeviceAddress, GET_DEVICE_ADDRESS_LEN, |p| {
            encode_device_address_request(p, addr)
        })?;
        decode_device_address(&buf.as_slice()[HEADER_LEN..])
    }

    /// Connector table
    pub fn get_connector_info(&self) -> CsmiResult<ConnectorInfo> {
        let (buf, _) = self.query(ControlCode::ConnectorInfo, CONNECTOR_INFO_LEN, |_| {})?;
        ConnectorInfo::decode(&buf.as_slice()[HEADER_LEN..])
    }
}
