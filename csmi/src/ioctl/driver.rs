//! Driver and controller payloads (signature `CSMIALL`)

use bitflags::bitflags;
use static_assertions::const_assert_eq;

use super::{ascii, le_u16, le_u32};
use crate::error::{check_len, CsmiResult};

/// `CSMI_SAS_DRIVER_INFO` size
pub const DRIVER_INFO_LEN: usize = 174;
/// `CSMI_SAS_CNTLR_CONFIG` size
pub const CONTROLLER_CONFIG_LEN: usize = 180;
/// `CSMI_SAS_CNTLR_STATUS` size
pub const CONTROLLER_STATUS_LEN: usize = 36;

const NAME_LEN: usize = 81;

// =============================================================================
// DRIVER INFO
// =============================================================================

/// Driver identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    /// Driver binary name, used for classification
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Driver version (major, minor, build, release)
    pub version: [u16; 4],
    /// CSMI revision implemented (major, minor)
    pub csmi_revision: (u16, u16),
}

impl DriverInfo {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("driver info", buf, DRIVER_INFO_LEN)?;
        Ok(Self {
            name: ascii(&buf[0..NAME_LEN]),
            description: ascii(&buf[NAME_LEN..2 * NAME_LEN]),
            version: [
                le_u16(buf, 162),
                le_u16(buf, 164),
                le_u16(buf, 166),
                le_u16(buf, 168),
            ],
            csmi_revision: (le_u16(buf, 170), le_u16(buf, 172)),
        })
    }
}

// =============================================================================
// CONTROLLER CONFIG
// =============================================================================

bitflags! {
    /// `uControllerFlags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControllerFlags: u32 {
        /// SAS HBA
        const SAS_HBA = 0x0000_0001;
        /// SAS RAID
        const SAS_RAID = 0x0000_0002;
        /// SATA HBA
        const SATA_HBA = 0x0000_0004;
        /// SATA RAID
        const SATA_RAID = 0x0000_0008;
        /// Smart Array
        const SMART_ARRAY = 0x0000_0010;
        /// Firmware download supported
        const FWD_SUPPORT = 0x0001_0000;
        /// Firmware download while online
        const FWD_ONLINE = 0x0002_0000;
        /// Soft reset after download
        const FWD_SRESET = 0x0004_0000;
        /// Hard reset after download
        const FWD_HRESET = 0x0008_0000;
        /// Recovery ROM present
        const FWD_RROM = 0x0010_0000;
    }
}

/// PCI location of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciAddress {
    /// Bus
    pub bus: u8,
    /// Device
    pub device: u8,
    /// Function
    pub function: u8,
}

const BUS_TYPE_PCI: u8 = 3;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// I/O base address
    pub base_io_address: u32,
    /// Memory base address
    pub base_memory_address: u64,
    /// Board identifier (vendor << 16 | device)
    pub board_id: u32,
    /// Slot number
    pub slot_number: u16,
    /// Controller class
    pub controller_class: u8,
    /// Bus type
    pub io_bus_type: u8,
    /// PCI location, when on PCI
    pub pci: Option<PciAddress>,
    /// Serial number
    pub serial_number: String,
    /// Firmware revision (major, minor, build, release)
    pub revision: [u16; 4],
    /// BIOS revision
    pub bios_revision: [u16; 4],
    /// Capability flags
    pub flags: ControllerFlags,
    /// Recovery ROM revision
    pub rrom_revision: [u16; 4],
    /// Recovery ROM BIOS revision
    pub rrom_bios_revision: [u16; 4],
}

fn quad(buf: &[u8], off: usize) -> [u16; 4] {
    [
        le_u16(buf, off),
        le_u16(buf, off + 2),
        le_u16(buf, off + 4),
        le_u16(buf, off + 6),
    ]
}

impl ControllerConfig {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("controller config", buf, CONTROLLER_CONFIG_LEN)?;
        let io_bus_type = buf[19];
        let pci = (io_bus_type == BUS_TYPE_PCI).then(|| PciAddress {
            bus: buf[20],
            device: buf[21],
            function: buf[22],
        });
        Ok(Self {
            base_io_address: le_u32(buf, 0),
            base_memory_address: (le_u32(buf, 4) as u64) | (le_u32(buf, 8) as u64) << 32,
            board_id: le_u32(buf, 12),
            slot_number: le_u16(buf, 16),
            controller_class: buf[18],
            io_bus_type,
            pci,
            serial_number: ascii(&buf[52..52 + NAME_LEN]),
            revision: quad(buf, 134),
            bios_revision: quad(buf, 142),
            flags: ControllerFlags::from_bits_retain(le_u32(buf, 152)),
            rrom_revision: quad(buf, 156),
            rrom_bios_revision: quad(buf, 164),
        })
    }
}

// =============================================================================
// CONTROLLER STATUS
// =============================================================================

/// `uStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Operational
    Good,
    /// Failed
    Failed,
    /// Offline
    Offline,
    /// Powered off
    PowerOff,
    /// Undefined value
    Unknown(u32),
}

impl ControllerState {
    /// Decode the raw status
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            1 => ControllerState::Good,
            2 => ControllerState::Failed,
            3 => ControllerState::Offline,
            4 => ControllerState::PowerOff,
            other => ControllerState::Unknown(other),
        }
    }
}

/// Controller status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    /// State
    pub state: ControllerState,
    /// Offline reason, meaningful when offline
    pub offline_reason: u32,
}

impl ControllerStatus {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("controller status", buf, CONTROLLER_STATUS_LEN)?;
        Ok(Self {
            state: ControllerState::from_u32(le_u32(buf, 0)),
            offline_reason: le_u32(buf, 4),
        })
    }

    /// Controller is usable
    pub fn is_good(&self) -> bool {
        self.state == ControllerState::Good
    }
}

const_assert_eq!(2 * NAME_LEN + 6 * 2, DRIVER_INFO_LEN);
const_assert_eq!(172 + 7 + 1, CONTROLLER_CONFIG_LEN);
