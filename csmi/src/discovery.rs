//! Endpoint discovery
//!
//! Turns a handle (or an enumeration hit) into a [`DeviceContext`]:
//!
//! ```text
//!  probe ──► classify ──► resolve address ──► place on phy table ──► bind
//!  driver     quirks       known / OS map /     by address, or by
//!  config     access       RAID config scan     live IDENTIFY/INQUIRY
//!  status
//! ```
//!
//! Placement by a driver-reported address is trusted over a live identity
//! probe, which is trusted over the bare phy the handle names.

use core::ops::Range;

use csmi_ata::identify::IDENTIFY_LEN;
use csmi_ata::{AtaCommand, IdentifyData};
use csmi_scsi::inquiry::vpd;
use csmi_scsi::{Cdb, CdbBuilder, InquiryData, SasAddress, UnitSerialNumber};

use crate::collab::Collaborators;
use crate::command::Controller;
use crate::device::{DeviceContext, ExpectedIdentity, IoBinding, MatchConfidence, OpenOptions};
use crate::driver::{
    packed_nvme_address, DriverFamily, DriverQuirks, SecurityAccess, VendorCapabilities,
};
use crate::error::{CsmiError, CsmiResult};
use crate::handle::LogicalAddress;
use crate::ioctl::address::ScsiAddress;
use crate::ioctl::driver::ControllerFlags;
use crate::ioctl::phy::{
    PhyEntity, PhyInfo, PortProtocol, SataSignature, IGNORE_PORT, USE_PORT_IDENTIFIER,
};
use crate::ioctl::raid::RaidInfo;
use crate::passthrough::{AtaRequest, Command, DataBuffer, Endpoint, ScsiRequest};

const INQUIRY_LEN: usize = 36;
const VPD_LEN: usize = 255;

/// How a target names its device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetForm {
    /// Port and phy identifiers
    Phy { port: u8, phy: u8 },
    /// OS path and target identifiers
    Os { path: u8, target: u8 },
    /// Only an address or identity is known
    Unplaced,
}

/// What discovery is asked to find
#[derive(Debug, Clone)]
pub(crate) struct DiscoveryTarget {
    pub controller: u32,
    pub base: Option<String>,
    pub form: TargetForm,
    pub lun: u8,
    pub identity: Option<ExpectedIdentity>,
    pub known_address: Option<SasAddress>,
}

impl DiscoveryTarget {
    pub fn from_address(address: &LogicalAddress, identity: Option<ExpectedIdentity>) -> Self {
        let form = match (address.path(), address.target()) {
            (Some(path), Some(target)) => TargetForm::Os { path, target },
            _ => TargetForm::Phy {
                port: address.port,
                phy: address.phy,
            },
        };
        Self {
            controller: address.controller,
            base: address.base.clone(),
            form,
            lun: address.lun,
            identity,
            known_address: None,
        }
    }

    fn handle_phy(&self) -> Option<u8> {
        match self.form {
            TargetForm::Phy { phy, .. } => Some(phy),
            _ => None,
        }
    }
}

/// Outcome of address resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Address(SasAddress),
    Nvme { confirmed: bool },
    Unresolved,
}

/// Where the device sits on the phy table
#[derive(Debug, Clone, Copy)]
struct Placement {
    port: u8,
    phy: u8,
    protocol: PortProtocol,
    sas_address: SasAddress,
    confidence: MatchConfidence,
}

impl Placement {
    fn from_phy(entity: &PhyEntity, confidence: MatchConfidence) -> Self {
        Self {
            port: entity.port_identifier,
            phy: entity.identify.phy_identifier,
            protocol: entity.attached.target_protocol,
            sas_address: entity.attached.sas_address,
            confidence,
        }
    }
}

/// Read-only view shared by the discovery steps
struct Probe<'a> {
    ctrl: &'a Controller,
    target: &'a DiscoveryTarget,
    options: &'a OpenOptions,
    collab: &'a Collaborators,
    quirks: DriverQuirks,
    access: SecurityAccess,
}

/// Locate the target behind `controller` and fill in its context
pub(crate) fn discover(
    controller: Controller,
    target: &DiscoveryTarget,
    options: &OpenOptions,
    collab: &Collaborators,
) -> CsmiResult<DeviceContext> {
    let driver = controller.get_driver_info()?;
    let config = controller.get_controller_config()?;
    let status = controller.get_controller_status()?;
    if !status.is_good() {
        return Err(CsmiError::ControllerUnavailable {
            state: status.state,
        });
    }

    let family = DriverFamily::classify(&driver.name);
    let quirks = family.quirks();
    let access = collab.access.access_level(&driver.name);
    if !access.allows_info() {
        return Err(CsmiError::AccessDenied { level: access });
    }
    if quirks != DriverQuirks::default() {
        log::warn!(
            "controller {}: driver {} ({:?}) needs quirks {:?}",
            target.controller,
            driver.name,
            family,
            quirks
        );
    }
    let mut capabilities = family.capabilities();
    if config.flags.contains(ControllerFlags::FWD_SUPPORT) {
        capabilities |= VendorCapabilities::FIRMWARE_DOWNLOAD;
    }

    let probe = Probe {
        ctrl: &controller,
        target,
        options,
        collab,
        quirks,
        access,
    };
    let resolved = probe.resolve_address()?;
    log::debug!("controller {}: resolved {:?}", target.controller, resolved);

    let sas_lun = [0, target.lun, 0, 0, 0, 0, 0, 0];
    let (placement, binding, address) = match resolved {
        Resolved::Nvme { confirmed } => {
            let (path, os_target) = match target.form {
                TargetForm::Os { path, target } => (path, target),
                _ => return Err(CsmiError::NoMatch),
            };
            let packed = SasAddress(packed_nvme_address(path, os_target, target.lun));
            let confidence = probe.confirm_nvme(packed, sas_lun, confirmed)?;
            let placement = Placement {
                port: IGNORE_PORT,
                phy: USE_PORT_IDENTIFIER,
                protocol: PortProtocol::SSP,
                sas_address: packed,
                confidence,
            };
            let address = LogicalAddress::alternate(target.controller, path, os_target, target.lun);
            (placement, IoBinding::VendorNvme, address)
        }
        other => {
            let phys = controller.get_phy_info()?;
            let placement = probe.place(&phys, other)?;
            let binding = if !placement.protocol.is_ata() {
                IoBinding::Ssp
            } else if collab.translator.is_available() {
                IoBinding::SoftwareSat
            } else {
                IoBinding::Stp
            };
            let address =
                LogicalAddress::new(target.controller, placement.port, placement.phy, target.lun);
            (placement, binding, address)
        }
    };

    let mut sata_signature = None;
    let mut scsi_address = None;
    if binding != IoBinding::VendorNvme {
        if placement.protocol.is_ata() {
            if options.fetch_sata_signature {
                sata_signature = probe.sata_signature(placement.phy)?;
            }
        } else {
            scsi_address = probe.scsi_address(&placement.sas_address, &sas_lun)?;
        }
    }
    let pm_port = sata_signature.as_ref().map_or(0, SataSignature::pm_port);

    Ok(DeviceContext {
        address: address.with_base(target.base.clone()),
        port: placement.port,
        phy: placement.phy,
        protocol: placement.protocol,
        sas_address: placement.sas_address,
        sas_lun,
        scsi_address,
        sata_signature,
        pm_port,
        driver_name: driver.name,
        family,
        quirks,
        access,
        capabilities,
        confidence: placement.confidence,
        binding,
        controller,
    })
}

/// RAID set indices the driver answers for
pub(crate) fn raid_set_indices(info: &RaidInfo, quirks: &DriverQuirks) -> Range<u32> {
    let base = quirks.raid_set_index_base;
    let count = if info.max_raid_sets != 0 {
        info.num_raid_sets.min(info.max_raid_sets)
    } else {
        info.num_raid_sets
    };
    base..base.saturating_add(count)
}

/// Driver-reported failure that only means "no answer here"
fn driver_declined(err: &CsmiError) -> bool {
    err.return_code().is_some()
}

impl Probe<'_> {
    fn usable(&self, addr: &SasAddress) -> bool {
        !addr.is_zero() || self.quirks.zero_sas_address_valid
    }

    fn resolve_address(&self) -> CsmiResult<Resolved> {
        if let Some(addr) = self.target.known_address.filter(|a| self.usable(a)) {
            return Ok(Resolved::Address(addr));
        }

        if let TargetForm::Os { path, target } = self.target.form {
            let host = u8::try_from(self.target.controller).ok();
            let reported = if self.quirks.skip_device_address_query {
                None
            } else if let Some(host) = host {
                let scsi = ScsiAddress {
                    host,
                    path,
                    target,
                    lun: self.target.lun,
                };
                match self.ctrl.get_device_address(&scsi) {
                    Ok((addr, _)) => Some(addr),
                    Err(e) if driver_declined(&e) => {
                        log::debug!(
                            "controller {}: no device address: {}",
                            self.target.controller,
                            e
                        );
                        None
                    }
                    Err(e) => return Err(e),
                }
            } else {
                log::debug!(
                    "controller {}: beyond the SCSI host range, no device address",
                    self.target.controller
                );
                None
            };

            if self.quirks.nvme_address_in_sas_address {
                let packed = SasAddress(packed_nvme_address(path, target, self.target.lun));
                match reported {
                    None => return Ok(Resolved::Nvme { confirmed: false }),
                    Some(addr) if addr == packed => return Ok(Resolved::Nvme { confirmed: true }),
                    _ => {}
                }
            }
            if let Some(addr) = reported.filter(|a| self.usable(a)) {
                return Ok(Resolved::Address(addr));
            }
        }

        if let Some(identity) = &self.target.identity {
            if let Some(addr) = self.scan_raid(identity)? {
                return Ok(Resolved::Address(addr));
            }
        }
        Ok(Resolved::Unresolved)
    }

    /// Address of the RAID drive matching `identity`
    fn scan_raid(&self, identity: &ExpectedIdentity) -> CsmiResult<Option<SasAddress>> {
        let info = match self.ctrl.get_raid_info() {
            Ok(info) => info,
            Err(e) if e.is_not_supported() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut found: Option<SasAddress> = None;
        for index in raid_set_indices(&info, &self.quirks) {
            let config = match self.ctrl.get_raid_config(index, info.max_drives_per_set) {
                Ok(config) => config,
                Err(e) if driver_declined(&e) => {
                    log::debug!("controller {}: raid set {}: {}", self.target.controller, index, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for drive in config
                .countable_drives()
                .filter(|d| identity.matches(&d.model, &d.serial_number))
            {
                match found {
                    Some(prev) if prev != drive.sas_address => {
                        return Err(CsmiError::Ambiguous(format!(
                            "serial {} reported at {} and {}",
                            identity.serial, prev, drive.sas_address
                        )))
                    }
                    _ => found = Some(drive.sas_address),
                }
            }
        }
        Ok(found.filter(|a| self.usable(a)))
    }

    fn place(&self, phys: &PhyInfo, resolved: Resolved) -> CsmiResult<Placement> {
        let handle_phy = self.target.handle_phy();
        match resolved {
            Resolved::Address(addr) => {
                let hits: Vec<&PhyEntity> = phys.find_attached(&addr).collect();
                let Some(first) = hits.first() else {
                    return self.place_by_identity(phys.end_devices().collect());
                };
                if hits.iter().all(|p| p.port_identifier == first.port_identifier) {
                    // Wide port: any phy reaches the device
                    let chosen = hits
                        .iter()
                        .find(|p| Some(p.identify.phy_identifier) == handle_phy)
                        .unwrap_or(first);
                    return Ok(Placement::from_phy(chosen, MatchConfidence::RaidConfigAddress));
                }
                if !addr.is_zero() {
                    return Err(CsmiError::Ambiguous(format!("{} attached on several ports", addr)));
                }
                self.place_by_identity(hits)
            }
            Resolved::Unresolved if self.target.identity.is_some() => {
                self.place_by_identity(phys.end_devices().collect())
            }
            _ => {
                let entity = handle_phy
                    .and_then(|id| phys.phy(id))
                    .filter(|p| p.has_end_device())
                    .ok_or(CsmiError::NoMatch)?;
                log::warn!(
                    "controller {}: phy {} taken from the phy table without identity check",
                    self.target.controller,
                    entity.identify.phy_identifier
                );
                Ok(Placement::from_phy(entity, MatchConfidence::PhyInfoOnly))
            }
        }
    }

    /// Live-probe `candidates`, handle phy first
    fn place_by_identity(&self, mut candidates: Vec<&PhyEntity>) -> CsmiResult<Placement> {
        let Some(identity) = &self.target.identity else {
            return Err(CsmiError::NoMatch);
        };
        if !self.access.allows_passthrough() {
            log::debug!("identity probe skipped at access level {:?}", self.access);
            return Err(CsmiError::NoMatch);
        }
        let handle_phy = self.target.handle_phy();
        candidates.sort_by_key(|p| Some(p.identify.phy_identifier) != handle_phy);

        let mut matched: Option<&PhyEntity> = None;
        for entity in candidates {
            let mut ep = Endpoint::new(
                entity.identify.phy_identifier,
                entity.port_identifier,
                entity.attached.sas_address,
            );
            ep.lun[1] = self.target.lun;
            let ata = entity.attached.target_protocol.is_ata();
            match self.identify(&mut ep, ata) {
                Ok((model, serial)) if identity.matches(&model, &serial) => match matched {
                    Some(prev) if prev.port_identifier != entity.port_identifier => {
                        return Err(CsmiError::Ambiguous(format!(
                            "serial {} answers on phys {} and {}",
                            identity.serial,
                            prev.identify.phy_identifier,
                            entity.identify.phy_identifier
                        )))
                    }
                    Some(_) => {}
                    None => matched = Some(entity),
                },
                Ok(_) => {}
                Err(e) => log::debug!("phy {}: identity probe failed: {}", ep.phy, e),
            }
        }
        matched
            .map(|p| Placement::from_phy(p, MatchConfidence::LiveIdentify))
            .ok_or(CsmiError::NoMatch)
    }

    fn confirm_nvme(
        &self,
        packed: SasAddress,
        lun: [u8; 8],
        confirmed: bool,
    ) -> CsmiResult<MatchConfidence> {
        if confirmed {
            return Ok(MatchConfidence::RaidConfigAddress);
        }
        let Some(identity) = &self.target.identity else {
            return Ok(MatchConfidence::PhyInfoOnly);
        };
        if !self.access.allows_passthrough() {
            return Ok(MatchConfidence::PhyInfoOnly);
        }
        let mut ep = Endpoint::new(USE_PORT_IDENTIFIER, IGNORE_PORT, packed);
        ep.lun = lun;
        match self.identify(&mut ep, false) {
            Ok((model, serial)) if identity.matches(&model, &serial) => {
                Ok(MatchConfidence::LiveIdentify)
            }
            Ok(_) => Err(CsmiError::NoMatch),
            Err(e) => {
                log::debug!("nvme {}: identity probe failed: {}", packed, e);
                Err(CsmiError::NoMatch)
            }
        }
    }

    /// Model and serial as the device reports them
    fn identify(&self, ep: &mut Endpoint, ata: bool) -> CsmiResult<(String, String)> {
        if ata {
            let mut block = [0u8; IDENTIFY_LEN];
            let mut req = AtaRequest::new(AtaCommand::identify(), DataBuffer::In(&mut block));
            req.timeout = self.options.passthrough_timeout;
            let mut command = Command::Ata(req);
            self.collab.passthrough.execute(self.ctrl, ep, &mut command)?;
            if let Command::Ata(req) = &command {
                if req.registers.is_some_and(|r| r.is_error()) {
                    return Err(CsmiError::Unsupported("IDENTIFY DEVICE aborted"));
                }
            }
            drop(command);
            let id = IdentifyData::from_bytes(&block)?;
            Ok((id.model_number(), id.serial_number()))
        } else {
            let mut data = [0u8; INQUIRY_LEN];
            self.scsi_in(ep, CdbBuilder::inquiry(false, 0, INQUIRY_LEN as u16), &mut data)?;
            let model = InquiryData::from_bytes(&data)?.model();
            let mut page = [0u8; VPD_LEN];
            let cdb = CdbBuilder::inquiry(true, vpd::UNIT_SERIAL_NUMBER, VPD_LEN as u16);
            self.scsi_in(ep, cdb, &mut page)?;
            let serial = UnitSerialNumber::from_bytes(&page)?.0;
            Ok((model, serial))
        }
    }

    fn scsi_in(&self, ep: &mut Endpoint, cdb: Cdb, data: &mut [u8]) -> CsmiResult<()> {
        let mut req = ScsiRequest::new(cdb, DataBuffer::In(data));
        req.timeout = self.options.passthrough_timeout;
        let mut command = Command::Scsi(req);
        self.collab.passthrough.execute(self.ctrl, ep, &mut command)?;
        match &command {
            Command::Scsi(req) if !req.status.is_good() => {
                Err(CsmiError::Unsupported("INQUIRY rejected"))
            }
            _ => Ok(()),
        }
    }

    fn sata_signature(&self, phy: u8) -> CsmiResult<Option<SataSignature>> {
        match self.ctrl.get_sata_signature(phy) {
            Ok(sig) => Ok(Some(sig)),
            Err(e) if driver_declined(&e) => {
                log::warn!("phy {}: no SATA signature: {}", phy, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn scsi_address(&self, sas: &SasAddress, lun: &[u8; 8]) -> CsmiResult<Option<ScsiAddress>> {
        match self.ctrl.get_scsi_address(sas, lun) {
            Ok(addr) => Ok(Some(addr)),
            Err(e) if driver_declined(&e) => {
                log::debug!("{}: no OS SCSI address: {}", sas, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
