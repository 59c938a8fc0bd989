//! Open devices
//!
//! A [`Device`] owns the controller handle it was discovered on and the
//! [`DeviceContext`] discovery filled in. [`Device::issue`] is the single
//! entry point for SCSI and ATA commands; the context's [`IoBinding`]
//! decides which protocol carries them.

use core::time::Duration;
use std::sync::Arc;

use csmi_scsi::SasAddress;

use crate::collab::{Collaborators, SatTranslator};
use crate::command::Controller;
use crate::discovery::{discover, DiscoveryTarget};
use crate::driver::{DriverFamily, DriverQuirks, SecurityAccess, VendorCapabilities};
use crate::error::{CsmiError, CsmiResult};
use crate::handle::LogicalAddress;
use crate::ioctl::address::ScsiAddress;
use crate::ioctl::firmware::{FirmwareDownloadStatus, FirmwareFlags};
use crate::ioctl::phy::{LinkErrors, PortProtocol, SataSignature};
use crate::ioctl::PASSTHRU_TIMEOUT;
use crate::passthrough::{execute_ssp, issue_ata, AtaRequest, AtaRoute, Command, Endpoint};
use crate::transport::Verbosity;

/// Layout version of [`DeviceContext`] callers must build against
pub const DEVICE_STRUCT_VERSION: u32 = 1;

/// How the endpoint was located, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchConfidence {
    /// Taken from the phy table without checking identity
    PhyInfoOnly,
    /// Confirmed by a live IDENTIFY or INQUIRY
    LiveIdentify,
    /// Located by a driver-reported SAS address
    RaidConfigAddress,
}

/// Protocol that carries commands to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoBinding {
    /// ATA over STP, falling back to SAT over SSP
    Stp,
    /// SCSI over SSP; ATA as SAT
    Ssp,
    /// SCSI translated in software into ATA
    SoftwareSat,
    /// SCSI over SSP to a packed NVMe address
    VendorNvme,
}

/// Model and serial a device must report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedIdentity {
    /// Model number
    pub model: String,
    /// Serial number
    pub serial: String,
}

impl ExpectedIdentity {
    /// Identity from model and serial
    pub fn new(model: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            serial: serial.into(),
        }
    }

    /// Serial must match; model only when one is expected
    pub fn matches(&self, model: &str, serial: &str) -> bool {
        let serial_ok = !self.serial.trim().is_empty() && self.serial.trim() == serial.trim();
        let model_ok = self.model.trim().is_empty() || self.model.trim() == model.trim();
        serial_ok && model_ok
    }
}

/// Options for [`Device::open`]
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Identity the device must report
    pub identity: Option<ExpectedIdentity>,
    /// Must equal [`DEVICE_STRUCT_VERSION`]
    pub struct_version: u32,
    /// Request dump threshold
    pub verbosity: Verbosity,
    /// Timeout for identity probes
    pub passthrough_timeout: Duration,
    /// Read the SATA signature FIS for ATA devices
    pub fetch_sata_signature: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            identity: None,
            struct_version: DEVICE_STRUCT_VERSION,
            verbosity: Verbosity::Off,
            passthrough_timeout: PASSTHRU_TIMEOUT,
            fetch_sata_signature: true,
        }
    }
}

impl OpenOptions {
    /// Builder: expected identity
    pub fn with_identity(mut self, model: &str, serial: &str) -> Self {
        self.identity = Some(ExpectedIdentity::new(model, serial));
        self
    }

    /// Builder: dump threshold
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// Everything known about an open device
#[derive(Debug)]
pub struct DeviceContext {
    pub(crate) controller: Controller,
    /// Resolved handle
    pub address: LogicalAddress,
    /// Port identifier
    pub port: u8,
    /// Phy identifier
    pub phy: u8,
    /// Protocols the attached device accepts
    pub protocol: PortProtocol,
    /// SAS address
    pub sas_address: SasAddress,
    /// SAS LUN
    pub sas_lun: [u8; 8],
    /// OS SCSI address, when the driver translated it
    pub scsi_address: Option<ScsiAddress>,
    /// SATA signature FIS, when read
    pub sata_signature: Option<SataSignature>,
    /// Port multiplier port
    pub pm_port: u8,
    /// Driver name as reported
    pub driver_name: String,
    /// Driver family
    pub family: DriverFamily,
    /// Quirks in force
    pub quirks: DriverQuirks,
    /// Access level granted by policy
    pub access: SecurityAccess,
    /// Vendor extensions
    pub capabilities: VendorCapabilities,
    /// How the endpoint was located
    pub confidence: MatchConfidence,
    /// Protocol binding
    pub binding: IoBinding,
}

impl DeviceContext {
    /// Controller the device sits behind
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Passthrough endpoint for this device
    pub fn endpoint(&self) -> Endpoint {
        let mut ep = Endpoint::new(self.phy, self.port, self.sas_address);
        ep.lun = self.sas_lun;
        ep.pm_port = self.pm_port;
        if self.binding == IoBinding::Ssp {
            ep.ata_route = AtaRoute::SatOverSsp;
        }
        ep
    }
}

/// An open device
#[derive(Debug)]
pub struct Device {
    context: DeviceContext,
    endpoint: Endpoint,
    translator: Arc<dyn SatTranslator>,
}

impl Device {
    /// Parse `handle`, open its controller and discover the device
    pub fn open(handle: &str, options: &OpenOptions, collab: &Collaborators) -> CsmiResult<Self> {
        if options.struct_version != DEVICE_STRUCT_VERSION {
            return Err(CsmiError::VersionMismatch {
                expected: DEVICE_STRUCT_VERSION,
                found: options.struct_version,
            });
        }
        let address: LogicalAddress = handle.parse()?;
        let target = DiscoveryTarget::from_address(&address, options.identity.clone());
        Self::open_target(&target, options, collab)
    }

    pub(crate) fn open_target(
        target: &DiscoveryTarget,
        options: &OpenOptions,
        collab: &Collaborators,
    ) -> CsmiResult<Self> {
        let transport = collab.opener.open(target.base.as_deref(), target.controller)?;
        let controller =
            Controller::new(transport, target.controller).with_verbosity(options.verbosity);
        let context = discover(controller, target, options, collab)?;
        log::info!(
            "opened {} ({}, phy {}, {:?}, {:?})",
            context.address,
            context.sas_address,
            context.phy,
            context.binding,
            context.confidence
        );
        Ok(Self {
            endpoint: context.endpoint(),
            context,
            translator: Arc::clone(&collab.translator),
        })
    }

    /// Read-only view of the discovered state
    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Route the ATA commands currently take
    pub fn ata_route(&self) -> AtaRoute {
        self.endpoint.ata_route
    }

    fn require(&self, allowed: fn(&SecurityAccess) -> bool) -> CsmiResult<()> {
        if allowed(&self.context.access) {
            Ok(())
        } else {
            Err(CsmiError::AccessDenied {
                level: self.context.access,
            })
        }
    }

    /// Issue a SCSI or ATA command
    pub fn issue(&mut self, command: &mut Command<'_>) -> CsmiResult<()> {
        self.require(SecurityAccess::allows_passthrough)?;
        let ctrl = &self.context.controller;
        let ep = &mut self.endpoint;
        match (self.context.binding, command) {
            (IoBinding::Stp, Command::Scsi(_)) => {
                Err(CsmiError::Unsupported("SCSI command on an STP-bound device"))
            }
            (IoBinding::VendorNvme, Command::Ata(_)) => {
                Err(CsmiError::Unsupported("ATA command on an NVMe device"))
            }
            (IoBinding::SoftwareSat, Command::Scsi(req)) => self
                .translator
                .translate(req, &mut |ata: &mut AtaRequest<'_>| issue_ata(ctrl, ep, ata)),
            (_, Command::Scsi(req)) => execute_ssp(ctrl, ep, req),
            (_, Command::Ata(req)) => issue_ata(ctrl, ep, req),
        }
    }

    /// Re-read the SATA signature and port multiplier port
    pub fn refresh_sata_signature(&mut self) -> CsmiResult<SataSignature> {
        self.require(SecurityAccess::allows_info)?;
        if !self.context.protocol.is_ata() {
            return Err(CsmiError::Unsupported("SATA signature of a non-ATA device"));
        }
        let sig = self.context.controller.get_sata_signature(self.context.phy)?;
        self.context.sata_signature = Some(sig);
        self.context.pm_port = sig.pm_port();
        self.endpoint.pm_port = sig.pm_port();
        Ok(sig)
    }

    /// Link error counters of the device's phy; `reset` clears them
    pub fn link_errors(&self, reset: bool) -> CsmiResult<LinkErrors> {
        if reset {
            self.require(SecurityAccess::allows_passthrough)?;
        } else {
            self.require(SecurityAccess::allows_info)?;
        }
        if self.context.binding == IoBinding::VendorNvme {
            return Err(CsmiError::Unsupported("link errors of an NVMe device"));
        }
        self.context.controller.get_link_errors(self.context.phy, reset)
    }

    /// Download a firmware image to the controller
    pub fn firmware_download(
        &self,
        image: &[u8],
        flags: FirmwareFlags,
    ) -> CsmiResult<FirmwareDownloadStatus> {
        self.require(SecurityAccess::allows_firmware)?;
        if !self.context.capabilities.contains(VendorCapabilities::FIRMWARE_DOWNLOAD) {
            return Err(CsmiError::Unsupported("firmware download"));
        }
        self.context.controller.firmware_download(image, flags)
    }
}
