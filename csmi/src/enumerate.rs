//! Enumeration over candidate handles
//!
//! Both passes walk the same way: RAID sets first, then the phy table for
//! whatever the RAID configuration could not name. The count pass stops
//! there; the list pass runs discovery on each hit.

use bitflags::bitflags;
use csmi_scsi::SasAddress;

use crate::collab::Collaborators;
use crate::command::Controller;
use crate::device::{Device, ExpectedIdentity, OpenOptions, DEVICE_STRUCT_VERSION};
use crate::discovery::{raid_set_indices, DiscoveryTarget, TargetForm};
use crate::driver::DriverFamily;
use crate::error::{CsmiError, CsmiResult};

bitflags! {
    /// Enumeration filters
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EnumerateFlags: u32 {
        /// Never fall back to the phy table
        const SKIP_PHY_FALLBACK = 0x01;
        /// SATA drives only
        const SATA_ONLY = 0x02;
        /// SAS drives only
        const SAS_ONLY = 0x04;
    }
}

impl EnumerateFlags {
    fn wants(&self, sata: bool) -> bool {
        if sata {
            !self.contains(EnumerateFlags::SAS_ONLY)
        } else {
            !self.contains(EnumerateFlags::SATA_ONLY)
        }
    }
}

/// One OS node and the controllers reachable through it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Device node, `None` for the platform default
    pub base: Option<String>,
    /// Controller numbers
    pub controllers: Vec<u32>,
}

impl Candidate {
    /// Candidate on the platform default node
    pub fn new(controllers: Vec<u32>) -> Self {
        Self {
            base: None,
            controllers,
        }
    }

    /// Builder: explicit node
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }
}

/// Overall outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationStatus {
    /// Nothing failed
    Success,
    /// Some probes failed but devices were found
    PartialSuccess,
    /// Probes failed and nothing was found
    Failure,
}

impl EnumerationStatus {
    fn from_counts(devices: usize, failures: usize) -> Self {
        match (devices, failures) {
            (_, 0) => EnumerationStatus::Success,
            (0, _) => EnumerationStatus::Failure,
            _ => EnumerationStatus::PartialSuccess,
        }
    }
}

/// Result of the count pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCount {
    /// Devices found
    pub devices: usize,
    /// Controllers that could not be probed
    pub failures: usize,
    /// Outcome
    pub status: EnumerationStatus,
}

/// Result of the list pass
#[derive(Debug)]
pub struct EnumerationReport {
    /// Opened devices
    pub devices: Vec<Device>,
    /// Controllers or devices that failed to open
    pub failures: usize,
    /// Outcome
    pub status: EnumerationStatus,
    /// Capacity ran out before the walk finished
    pub truncated: bool,
}

/// Phys already claimed on one controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhyBitmap(u32);

impl PhyBitmap {
    /// Claim `phy`; false if it was already claimed or out of range
    pub fn claim(&mut self, phy: u8) -> bool {
        if phy >= 32 || self.contains(phy) {
            return false;
        }
        self.0 |= 1 << phy;
        true
    }

    /// `phy` is claimed
    pub fn contains(&self, phy: u8) -> bool {
        phy < 32 && self.0 & (1 << phy) != 0
    }

    /// Number of claimed phys
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }
}

/// A device found by the walk, not yet opened
#[derive(Debug, Clone)]
struct Found {
    form: TargetForm,
    known_address: Option<SasAddress>,
    identity: Option<ExpectedIdentity>,
}

/// Same drive reported by more than one set
fn seen_before(seen: &mut Vec<String>, key: String) -> bool {
    if seen.contains(&key) {
        true
    } else {
        seen.push(key);
        false
    }
}

fn walk_controller(ctrl: &Controller, flags: EnumerateFlags) -> CsmiResult<Vec<Found>> {
    let driver = ctrl.get_driver_info()?;
    let quirks = DriverFamily::classify(&driver.name).quirks();

    let mut found = Vec::new();
    let mut seen = Vec::new();
    let mut claimed_addresses = Vec::new();
    // Phys the RAID walk left unnamed; unbounded without RAID support
    let mut fallback_needed = None;

    match ctrl.get_raid_info() {
        Ok(info) => {
            let mut unnamed = 0usize;
            for index in raid_set_indices(&info, &quirks) {
                let config = match ctrl.get_raid_config(index, info.max_drives_per_set) {
                    Ok(config) => config,
                    Err(e) if e.return_code().is_some() => {
                        log::debug!("controller {}: raid set {}: {}", ctrl.number(), index, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for drive in config
                    .countable_drives()
                    .filter(|d| flags.wants(d.drive_type.is_sata()))
                {
                    let address = Some(drive.sas_address)
                        .filter(|a| !a.is_zero() || quirks.zero_sas_address_valid);
                    let serial = drive.serial_number.trim();
                    let identity = (!serial.is_empty())
                        .then(|| ExpectedIdentity::new(drive.model.trim(), serial));
                    let key = match (&identity, address) {
                        (Some(id), _) => format!("serial:{}", id.serial),
                        (None, Some(addr)) if !addr.is_zero() => format!("sas:{}", addr),
                        (None, Some(_)) | (None, None) => {
                            unnamed += 1;
                            continue;
                        }
                    };
                    if seen_before(&mut seen, key) {
                        continue;
                    }
                    if let Some(addr) = address.filter(|a| !a.is_zero()) {
                        claimed_addresses.push(addr);
                    }
                    found.push(Found {
                        form: TargetForm::Unplaced,
                        known_address: address,
                        identity,
                    });
                }
            }
            if unnamed > 0 {
                fallback_needed = Some(unnamed);
            }
        }
        Err(e) if e.is_not_supported() => {
            log::debug!("controller {}: no RAID support, walking phys", ctrl.number());
            fallback_needed = Some(usize::MAX);
        }
        Err(e) => return Err(e),
    }

    let Some(limit) = fallback_needed else {
        return Ok(found);
    };
    if flags.contains(EnumerateFlags::SKIP_PHY_FALLBACK) {
        log::debug!("controller {}: phy fallback skipped", ctrl.number());
        return Ok(found);
    }

    let phys = ctrl.get_phy_info()?;
    let mut claimed = PhyBitmap::default();
    for addr in &claimed_addresses {
        for entity in phys.find_attached(addr) {
            claimed.claim(entity.identify.phy_identifier);
        }
    }
    let before = found.len();
    for entity in phys.end_devices() {
        if found.len() - before >= limit {
            break;
        }
        if !flags.wants(entity.attached.target_protocol.is_ata()) {
            continue;
        }
        if claimed.claim(entity.identify.phy_identifier) {
            found.push(Found {
                form: TargetForm::Phy {
                    port: entity.port_identifier,
                    phy: entity.identify.phy_identifier,
                },
                known_address: None,
                identity: None,
            });
        }
    }
    Ok(found)
}

/// Open `number` through the candidate's node and walk it
fn probe_controller(
    base: Option<&str>,
    number: u32,
    flags: EnumerateFlags,
    collab: &Collaborators,
) -> CsmiResult<Vec<Found>> {
    let transport = collab.opener.open(base, number)?;
    let ctrl = Controller::new(transport, number);
    walk_controller(&ctrl, flags)
}

/// Count devices behind `candidates`, draining each one probed
pub fn count_devices(
    candidates: &mut Vec<Candidate>,
    flags: EnumerateFlags,
    collab: &Collaborators,
) -> DeviceCount {
    let mut devices = 0;
    let mut failures = 0;
    while !candidates.is_empty() {
        let candidate = candidates.remove(0);
        for &number in &candidate.controllers {
            match probe_controller(candidate.base.as_deref(), number, flags, collab) {
                Ok(found) => devices += found.len(),
                Err(e) => {
                    log::warn!("controller {}: probe failed: {}", number, e);
                    failures += 1;
                }
            }
        }
    }

    let status = EnumerationStatus::from_counts(devices, failures);
    if status == EnumerationStatus::PartialSuccess {
        log::warn!("counted {} devices, {} controllers failed", devices, failures);
    }
    log::info!("count pass: {} devices ({:?})", devices, status);
    DeviceCount {
        devices,
        failures,
        status,
    }
}

/// Open up to `capacity` devices behind `candidates`
///
/// Candidates are drained as they are probed; any left in the vector were
/// never touched because capacity ran out first.
pub fn list_devices(
    candidates: &mut Vec<Candidate>,
    capacity: usize,
    flags: EnumerateFlags,
    options: &OpenOptions,
    collab: &Collaborators,
) -> CsmiResult<EnumerationReport> {
    if options.struct_version != DEVICE_STRUCT_VERSION {
        return Err(CsmiError::VersionMismatch {
            expected: DEVICE_STRUCT_VERSION,
            found: options.struct_version,
        });
    }

    let mut devices = Vec::new();
    let mut failures = 0;
    let mut truncated = false;

    'candidates: while !candidates.is_empty() {
        if devices.len() >= capacity {
            truncated = true;
            break;
        }
        let candidate = candidates.remove(0);
        for &number in &candidate.controllers {
            let found = match probe_controller(candidate.base.as_deref(), number, flags, collab) {
                Ok(found) => found,
                Err(e) => {
                    log::warn!("controller {}: probe failed: {}", number, e);
                    failures += 1;
                    continue;
                }
            };
            for hit in found {
                if devices.len() >= capacity {
                    truncated = true;
                    break 'candidates;
                }
                let target = DiscoveryTarget {
                    controller: number,
                    base: candidate.base.clone(),
                    form: hit.form,
                    lun: 0,
                    identity: hit.identity,
                    known_address: hit.known_address,
                };
                match Device::open_target(&target, options, collab) {
                    Ok(device) => devices.push(device),
                    Err(e) => {
                        log::warn!("controller {}: device open failed: {}", number, e);
                        failures += 1;
                    }
                }
            }
        }
    }

    let status = EnumerationStatus::from_counts(devices.len(), failures);
    if status == EnumerationStatus::PartialSuccess {
        log::warn!("listed {} devices, {} failures", devices.len(), failures);
    }
    log::info!(
        "list pass: {} devices ({:?}{})",
        devices.len(),
        status,
        if truncated { ", truncated" } else { "" }
    );
    Ok(EnumerationReport {
        devices,
        failures,
        status,
        truncated,
    })
}
