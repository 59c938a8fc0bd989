//! Simulated controller for unit tests
//!
//! `SimController` plays the driver side of the IOCTL exchange: it reads
//! the request the library built, answers from an in-memory topology and
//! records what it saw.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use csmi_ata::command::opcode as ata_op;
use csmi_ata::fis::REGISTER_FIS_LEN;
use csmi_ata::identify::{encode_ata_string, IDENTIFY_LEN};
use csmi_ata::AtaResultRegisters;
use csmi_scsi::sense::ata_status_return;
use csmi_scsi::{opcode, SasAddress, SasDeviceType};

use crate::collab::HandleOpener;
use crate::command::Controller;
use crate::error::{CsmiError, CsmiResult};
use crate::ioctl::address::ScsiAddress;
use crate::ioctl::driver::ControllerFlags;
use crate::ioctl::passthru::{SSP_FIXED_LEN, SSP_PARAMS_LEN, STP_FIXED_LEN, STP_PARAMS_LEN};
use crate::ioctl::phy::{PortProtocol, PHY_ENTITY_LEN, USE_PORT_IDENTIFIER};
use crate::ioctl::raid::{DriveUsage, RAID_CONFIG_FIXED_LEN, RAID_DRIVE_LEN};
use crate::ioctl::{
    le_u32, put_u16, put_u32, ControlCode, IoctlHeaderLayout, NativeHeader, ReturnCode, HEADER_LEN,
};
use crate::transport::CsmiTransport;

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const GOOD: u8 = 0x00;
const CHECK_CONDITION: u8 = 0x02;
const BUSY: u8 = 0x08;
const SENSE_DATA: u8 = 2;
const OPEN_REJECT: u8 = 0x02;

/// How STP requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StpBehavior {
    /// Execute against the attached device
    Normal,
    /// Refuse with SCSI_EMULATION
    ScsiEmulation,
    /// Succeed at the IOCTL level but reject the connection
    OpenReject,
}

/// How SSP requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SspBehavior {
    /// Execute against the attached device, translating SAT
    Normal,
    /// ATA PASS-THROUGH (16) is an invalid opcode, everything else normal
    RejectPassThrough16,
    /// Every CDB fails with NOT READY
    NotReady,
    /// Every CDB is an invalid opcode
    InvalidOpcode,
    /// Every CDB ends BUSY with no sense data
    Busy,
}

/// One RAID drive entry
#[derive(Debug, Clone)]
pub struct SimDrive {
    model: String,
    serial: String,
    sas: u64,
    usage: DriveUsage,
    drive_type: u8,
}

impl SimDrive {
    /// SATA drive entry
    pub fn sata(model: &str, serial: &str, sas: u64, usage: DriveUsage) -> Self {
        Self {
            model: model.to_string(),
            serial: serial.to_string(),
            sas,
            usage,
            drive_type: 3,
        }
    }

    /// SAS drive entry
    pub fn sas(model: &str, serial: &str, sas: u64, usage: DriveUsage) -> Self {
        Self {
            drive_type: 1,
            ..Self::sata(model, serial, sas, usage)
        }
    }
}

#[derive(Debug, Clone)]
struct SimPhy {
    phy: u8,
    port: u8,
    sas: SasAddress,
    ata: bool,
    model: String,
    serial: String,
}

#[derive(Debug, Clone)]
struct SimNvme {
    address: SasAddress,
    model: String,
    serial: String,
}

#[derive(Debug)]
struct SimState {
    driver_name: String,
    controller_state: u32,
    raid_supported: bool,
    raid_index_base: u32,
    raid_sets: Vec<Vec<SimDrive>>,
    phys: Vec<SimPhy>,
    nvme: Vec<SimNvme>,
    addresses: Vec<(SasAddress, ScsiAddress)>,
    stp: StpBehavior,
    ssp: SspBehavior,
    overrides: HashMap<ControlCode, ReturnCode>,
    transport_errors: Vec<ControlCode>,
    link_errors: u32,
    calls: Vec<ControlCode>,
    last_payload_len: usize,
    last_cdb: Vec<u8>,
    last_command_fis: [u8; REGISTER_FIS_LEN],
    firmware_image: Vec<u8>,
}

/// In-memory controller answering CSMI IOCTLs
#[derive(Debug, Clone)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    /// Controller whose driver reports `driver_name`
    pub fn new(driver_name: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                driver_name: driver_name.to_string(),
                controller_state: 1,
                raid_supported: true,
                raid_index_base: 0,
                raid_sets: Vec::new(),
                phys: Vec::new(),
                nvme: Vec::new(),
                addresses: Vec::new(),
                stp: StpBehavior::Normal,
                ssp: SspBehavior::Normal,
                overrides: HashMap::new(),
                transport_errors: Vec::new(),
                link_errors: 7,
                calls: Vec::new(),
                last_payload_len: 0,
                last_cdb: Vec::new(),
                last_command_fis: [0; REGISTER_FIS_LEN],
                firmware_image: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    /// A `Controller` issuing into this simulation
    pub fn controller(&self, number: u32) -> Controller {
        Controller::new(Box::new(self.clone()), number)
    }

    /// Control codes issued so far
    pub fn calls(&self) -> Vec<ControlCode> {
        self.lock().calls.clone()
    }

    /// Number of times `code` was issued
    pub fn count(&self, code: ControlCode) -> usize {
        self.lock().calls.iter().filter(|&&c| c == code).count()
    }

    /// Answer every `code` with `rc`
    pub fn override_return(&self, code: ControlCode, rc: ReturnCode) {
        self.lock().overrides.insert(code, rc);
    }

    /// Fail the OS call for every `code`
    pub fn fail_transport(&self, code: ControlCode) {
        self.lock().transport_errors.push(code);
    }

    /// Raw controller status reported by CONTROLLER_STATUS
    pub fn set_controller_state(&self, raw: u32) {
        self.lock().controller_state = raw;
    }

    /// Report no RAID support
    pub fn disable_raid(&self) {
        self.lock().raid_supported = false;
    }

    /// First valid RAID set index
    pub fn set_raid_index_base(&self, base: u32) {
        self.lock().raid_index_base = base;
    }

    /// Append a RAID set
    pub fn add_raid_set(&self, drives: Vec<SimDrive>) {
        self.lock().raid_sets.push(drives);
    }

    /// SATA device attached to `phy`
    pub fn add_sata_phy(&self, phy: u8, port: u8, sas: u64) {
        self.add_phy(phy, port, sas, true);
    }

    /// SAS device attached to `phy`
    pub fn add_sas_phy(&self, phy: u8, port: u8, sas: u64) {
        self.add_phy(phy, port, sas, false);
    }

    fn add_phy(&self, phy: u8, port: u8, sas: u64, ata: bool) {
        self.lock().phys.push(SimPhy {
            phy,
            port,
            sas: SasAddress::from_u64(sas),
            ata,
            model: String::new(),
            serial: String::new(),
        });
    }

    /// Model and serial of the device on `phy`
    pub fn set_identity(&self, phy: u8, model: &str, serial: &str) {
        let mut state = self.lock();
        if let Some(p) = state.phys.iter_mut().find(|p| p.phy == phy) {
            p.model = model.to_string();
            p.serial = serial.to_string();
        }
    }

    /// NVMe device reachable only through its packed address
    pub fn add_nvme(&self, address: [u8; 8], model: &str, serial: &str) {
        self.lock().nvme.push(SimNvme {
            address: SasAddress(address),
            model: model.to_string(),
            serial: serial.to_string(),
        });
    }

    /// STP answer mode
    pub fn set_stp(&self, behavior: StpBehavior) {
        self.lock().stp = behavior;
    }

    /// SSP answer mode
    pub fn set_ssp(&self, behavior: SspBehavior) {
        self.lock().ssp = behavior;
    }

    /// Entry for both address translations
    pub fn map_address(&self, sas: SasAddress, scsi: ScsiAddress) {
        self.lock().addresses.push((sas, scsi));
    }

    /// Payload length of the last request
    pub fn last_payload_len(&self) -> usize {
        self.lock().last_payload_len
    }

    /// CDB of the last SSP request, additional bytes included
    pub fn last_cdb(&self) -> Vec<u8> {
        self.lock().last_cdb.clone()
    }

    /// Command FIS of the last STP request
    pub fn last_command_fis(&self) -> [u8; REGISTER_FIS_LEN] {
        self.lock().last_command_fis
    }

    /// Image bytes of the last firmware download
    pub fn firmware_image(&self) -> Vec<u8> {
        self.lock().firmware_image.clone()
    }
}

impl CsmiTransport for SimController {
    fn ioctl(&self, code: ControlCode, buffer: &mut [u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.calls.push(code);
        if state.transport_errors.contains(&code) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "simulated timeout"));
        }
        let (header, payload) = buffer.split_at_mut(HEADER_LEN);
        state.last_payload_len = payload.len();

        if let Some(rc) = state.overrides.get(&code).copied() {
            NativeHeader::set_return_code(header, rc);
            return Ok(());
        }
        let (rc, returned) = state.answer(code, payload);
        NativeHeader::set_return_code(header, rc);
        if let Some(len) = returned {
            NativeHeader::set_payload_len(header, len as u32);
        }
        Ok(())
    }
}

impl SimState {
    fn answer(&mut self, code: ControlCode, p: &mut [u8]) -> (ReturnCode, Option<usize>) {
        let rc = match code {
            ControlCode::DriverInfo => {
                let name = self.driver_name.as_bytes();
                p[..name.len()].copy_from_slice(name);
                p[81..88].copy_from_slice(b"sim hba");
                ReturnCode::SUCCESS
            }
            ControlCode::ControllerConfig => {
                put_u32(p, 12, 0x8086);
                put_u32(p, 152, ControllerFlags::FWD_SUPPORT.bits());
                ReturnCode::SUCCESS
            }
            ControlCode::ControllerStatus => {
                put_u32(p, 0, self.controller_state);
                ReturnCode::SUCCESS
            }
            ControlCode::FirmwareDownload => {
                let len = le_u32(p, 0) as usize;
                self.firmware_image = p[44..44 + len].to_vec();
                ReturnCode::SUCCESS
            }
            ControlCode::RaidInfo if !self.raid_supported => ReturnCode::BAD_CNTL_CODE,
            ControlCode::RaidInfo => {
                put_u32(p, 0, self.raid_sets.len() as u32);
                put_u32(p, 4, 8);
                put_u32(p, 8, 16);
                ReturnCode::SUCCESS
            }
            ControlCode::RaidConfig => return self.raid_config(p),
            ControlCode::RaidFeatures => ReturnCode::SUCCESS,
            ControlCode::PhyInfo => {
                self.phy_info(p);
                ReturnCode::SUCCESS
            }
            ControlCode::LinkErrors => {
                let phy = p[0];
                if !self.phys.iter().any(|d| d.phy == phy) {
                    return (ReturnCode::PHY_DOES_NOT_EXIST, None);
                }
                put_u32(p, 4, self.link_errors);
                if p[1] != 0 {
                    self.link_errors = 0;
                }
                ReturnCode::SUCCESS
            }
            ControlCode::SataSignature => match self.phys.iter().find(|d| d.phy == p[0]) {
                Some(d) if d.ata => {
                    p[4] = 0x34;
                    p[6] = 0x50;
                    p[8] = 0x01;
                    p[16] = 0x01;
                    ReturnCode::SUCCESS
                }
                _ => ReturnCode::NO_SATA_DEVICE,
            },
            ControlCode::ScsiAddress => {
                let sas = SasAddress::from_slice(&p[0..8]).unwrap_or(SasAddress::ZERO);
                match self.addresses.iter().find(|(a, _)| *a == sas) {
                    Some((_, scsi)) => {
                        p[16..20].copy_from_slice(&[scsi.host, scsi.path, scsi.target, scsi.lun]);
                        ReturnCode::SUCCESS
                    }
                    None => ReturnCode::NO_SCSI_ADDRESS,
                }
            }
            ControlCode::DeviceAddress => {
                let want = ScsiAddress {
                    host: p[0],
                    path: p[1],
                    target: p[2],
                    lun: p[3],
                };
                match self.addresses.iter().find(|(_, s)| *s == want) {
                    Some((sas, _)) => {
                        p[4..12].copy_from_slice(&sas.0);
                        ReturnCode::SUCCESS
                    }
                    None => ReturnCode::NO_DEVICE_ADDRESS,
                }
            }
            ControlCode::ConnectorInfo => ReturnCode::SUCCESS,
            ControlCode::SspPassthru => {
                self.ssp(p);
                ReturnCode::SUCCESS
            }
            ControlCode::StpPassthru => return (self.stp(p), None),
        };
        (rc, None)
    }

    fn raid_config(&self, p: &mut [u8]) -> (ReturnCode, Option<usize>) {
        let index = le_u32(p, 0);
        let set = index
            .checked_sub(self.raid_index_base)
            .and_then(|i| self.raid_sets.get(i as usize));
        let Some(drives) = set else {
            return (ReturnCode::RAID_SET_OUT_OF_RANGE, None);
        };
        p[12] = 1;
        p[15] = drives.len() as u8;
        for (slot, drive) in drives.iter().enumerate() {
            let e = &mut p[RAID_CONFIG_FIXED_LEN + slot * RAID_DRIVE_LEN..][..RAID_DRIVE_LEN];
            e[..drive.model.len()].copy_from_slice(drive.model.as_bytes());
            e[48..48 + drive.serial.len()].copy_from_slice(drive.serial.as_bytes());
            e[88..96].copy_from_slice(&drive.sas.to_be_bytes());
            e[105] = usage_byte(drive.usage);
            put_u16(e, 106, 512);
            e[108] = drive.drive_type;
            put_u32(e, 124, slot as u32);
        }
        (
            ReturnCode::SUCCESS,
            Some(RAID_CONFIG_FIXED_LEN + drives.len() * RAID_DRIVE_LEN),
        )
    }

    fn phy_info(&self, p: &mut [u8]) {
        p[0] = self.phys.len() as u8;
        for (slot, d) in self.phys.iter().enumerate() {
            let e = &mut p[4 + slot * PHY_ENTITY_LEN..][..PHY_ENTITY_LEN];
            e[0] = SasDeviceType::EndDevice.to_identify_byte();
            e[2] = (PortProtocol::SSP | PortProtocol::STP).bits();
            e[12..20].copy_from_slice(&0x5000_0000_0000_FF00u64.to_be_bytes());
            e[20] = d.phy;
            e[28] = d.port;
            e[29] = 0x0A;
            e[36] = SasDeviceType::EndDevice.to_identify_byte();
            e[39] = if d.ata {
                (PortProtocol::SATA | PortProtocol::STP).bits()
            } else {
                PortProtocol::SSP.bits()
            };
            e[48..56].copy_from_slice(&d.sas.0);
            e[56] = d.phy;
        }
    }

    fn phy_for(&self, phy: u8, dest: &SasAddress) -> Option<(String, String, bool)> {
        if phy != USE_PORT_IDENTIFIER {
            if let Some(d) = self.phys.iter().find(|d| d.phy == phy) {
                return Some((d.model.clone(), d.serial.clone(), d.ata));
            }
        }
        self.nvme
            .iter()
            .find(|n| n.address == *dest)
            .map(|n| (n.model.clone(), n.serial.clone(), false))
    }

    fn ssp(&mut self, p: &mut [u8]) {
        let base = p[20] as usize;
        let extra = p[21] as usize * 4;
        let mut cdb = p[24..24 + base].to_vec();
        cdb.extend_from_slice(&p[44..44 + extra]);
        self.last_cdb = cdb.clone();

        let dest = SasAddress::from_slice(&p[4..12]).unwrap_or(SasAddress::ZERO);
        let device = self.phy_for(p[0], &dest);
        let data_len = le_u32(p, 68) as usize;
        let (fixed, data) = p.split_at_mut(SSP_FIXED_LEN);
        let status = &mut fixed[SSP_PARAMS_LEN..];

        match self.ssp {
            SspBehavior::InvalidOpcode => return check_condition(status, &invalid_opcode()),
            SspBehavior::NotReady => return check_condition(status, &fixed_sense(0x02, 0x04, 0x00)),
            SspBehavior::Busy => {
                status[5] = BUSY;
                return;
            }
            SspBehavior::RejectPassThrough16 if cdb[0] == opcode::ATA_PASS_THROUGH_16 => {
                return check_condition(status, &invalid_opcode())
            }
            _ => {}
        }
        let Some((model, serial, _)) = device else {
            status[0] = OPEN_REJECT;
            return;
        };

        let response: Vec<u8> = match cdb[0] {
            opcode::TEST_UNIT_READY => Vec::new(),
            opcode::INQUIRY if cdb[1] & 0x01 == 0 => inquiry(&model),
            opcode::INQUIRY if cdb[2] == 0x80 => unit_serial(&serial),
            opcode::ATA_PASS_THROUGH_16 | opcode::ATA_PASS_THROUGH_12 => {
                let command = if cdb[0] == opcode::ATA_PASS_THROUGH_16 { cdb[14] } else { cdb[9] };
                if command == ata_op::IDENTIFY_DEVICE {
                    identify_block(&model, &serial).to_vec()
                } else {
                    let regs = AtaResultRegisters {
                        status: 0x50,
                        count: 0xFF,
                        ..Default::default()
                    };
                    let sense = ata_status_return(&regs, false);
                    return check_condition(status, sense.as_slice());
                }
            }
            _ => return check_condition(status, &invalid_opcode()),
        };
        let n = response.len().min(data_len).min(data.len());
        data[..n].copy_from_slice(&response[..n]);
        status[5] = GOOD;
        put_u32(status, 264, n as u32);
    }

    fn stp(&mut self, p: &mut [u8]) -> ReturnCode {
        self.last_command_fis.copy_from_slice(&p[16..36]);
        if self.stp == StpBehavior::ScsiEmulation {
            return ReturnCode::SCSI_EMULATION;
        }
        let Some(device) = self.phys.iter().find(|d| d.phy == p[0] && d.ata) else {
            return ReturnCode::NO_SATA_DEVICE;
        };
        let command = p[18];
        let data_len = le_u32(p, 40) as usize;
        let (fixed, data) = p.split_at_mut(STP_FIXED_LEN);
        let status = &mut fixed[STP_PARAMS_LEN..];
        if self.stp == StpBehavior::OpenReject {
            status[0] = OPEN_REJECT;
            return ReturnCode::SUCCESS;
        }

        if command == ata_op::IDENTIFY_DEVICE {
            let block = identify_block(&device.model, &device.serial);
            let n = IDENTIFY_LEN.min(data_len).min(data.len());
            data[..n].copy_from_slice(&block[..n]);
            // PIO Setup: ending status lives in E_Status
            status[4] = 0x5F;
            status[5] = 0x20;
            status[6] = 0x58;
            status[19] = 0x50;
            put_u32(status, 88, n as u32);
        } else {
            status[4] = 0x34;
            status[5] = 0x40;
            status[6] = 0x50;
            status[16] = 0xFF;
        }
        ReturnCode::SUCCESS
    }
}

fn usage_byte(usage: DriveUsage) -> u8 {
    match usage {
        DriveUsage::NotUsed => 0,
        DriveUsage::Member => 1,
        DriveUsage::Spare => 2,
        DriveUsage::SpareActive => 3,
        DriveUsage::SrtCache => 4,
        DriveUsage::SrtData => 5,
        DriveUsage::Unknown(b) => b,
    }
}

fn fixed_sense(key: u8, asc: u8, ascq: u8) -> [u8; 18] {
    let mut sense = [0u8; 18];
    sense[0] = 0x70;
    sense[2] = key;
    sense[7] = 10;
    sense[12] = asc;
    sense[13] = ascq;
    sense
}

fn invalid_opcode() -> [u8; 18] {
    fixed_sense(0x05, 0x20, 0x00)
}

fn check_condition(status: &mut [u8], sense: &[u8]) {
    status[4] = SENSE_DATA;
    status[5] = CHECK_CONDITION;
    status[6..8].copy_from_slice(&(sense.len() as u16).to_be_bytes());
    status[8..8 + sense.len()].copy_from_slice(sense);
}

fn inquiry(model: &str) -> Vec<u8> {
    let (vendor, product) = model.split_once(' ').unwrap_or(("", model));
    let mut data = vec![b' '; 36];
    data[..8].copy_from_slice(&[0x00, 0x00, 0x06, 0x12, 31, 0, 0, 0x02]);
    data[8..8 + vendor.len()].copy_from_slice(vendor.as_bytes());
    data[16..16 + product.len()].copy_from_slice(product.as_bytes());
    data[32..36].copy_from_slice(b"0001");
    data
}

fn unit_serial(serial: &str) -> Vec<u8> {
    let mut data = vec![0x00, 0x80, 0x00, serial.len() as u8];
    data.extend_from_slice(serial.as_bytes());
    data
}

fn identify_block(model: &str, serial: &str) -> [u8; IDENTIFY_LEN] {
    let mut block = [0u8; IDENTIFY_LEN];
    encode_ata_string(&mut block, 10, 10, serial);
    encode_ata_string(&mut block, 23, 4, "SIM1");
    encode_ata_string(&mut block, 27, 20, model);
    block
}

// =============================================================================
// HANDLE OPENER
// =============================================================================

/// Opener handing out simulated controllers by number
#[derive(Debug, Default)]
pub struct SimOpener {
    controllers: Mutex<HashMap<u32, SimController>>,
    opened: Mutex<Vec<u32>>,
}

impl SimOpener {
    /// Empty opener; every open fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sim` as controller `number`
    pub fn with(self, number: u32, sim: &SimController) -> Self {
        self.controllers.lock().unwrap().insert(number, sim.clone());
        self
    }

    /// Controller numbers opened so far
    pub fn opened(&self) -> Vec<u32> {
        self.opened.lock().unwrap().clone()
    }
}

impl HandleOpener for SimOpener {
    fn open(&self, _base: Option<&str>, controller: u32) -> CsmiResult<Box<dyn CsmiTransport>> {
        self.opened.lock().unwrap().push(controller);
        match self.controllers.lock().unwrap().get(&controller) {
            Some(sim) => Ok(Box::new(sim.clone())),
            None => Err(CsmiError::Transport(io::Error::from(io::ErrorKind::NotFound))),
        }
    }
}
