//! Phy, link and connector payloads (signature `CSMISAS`)

use bitflags::bitflags;
use csmi_ata::fis::REGISTER_FIS_LEN;
use csmi_scsi::{SasAddress, SasDeviceType, SasLinkRate};
use static_assertions::const_assert_eq;

use super::{ascii, bytes8, le_u32};
use crate::error::{check_len, CsmiResult};

/// Phy entries in `CSMI_SAS_PHY_INFO`
pub const MAX_PHYS: usize = 32;
/// `CSMI_SAS_IDENTIFY` size
pub const IDENTIFY_LEN: usize = 28;
/// `CSMI_SAS_PHY_ENTITY` size
pub const PHY_ENTITY_LEN: usize = 64;
/// `CSMI_SAS_PHY_INFO` size
pub const PHY_INFO_LEN: usize = 4 + MAX_PHYS * PHY_ENTITY_LEN;
/// Extra bytes allocated past the phy info structure
pub const PHY_INFO_SLACK: usize = 4096;
/// `CSMI_SAS_LINK_ERRORS` size
pub const LINK_ERRORS_LEN: usize = 20;
/// `CSMI_SAS_SATA_SIGNATURE` size
pub const SATA_SIGNATURE_LEN: usize = 4 + REGISTER_FIS_LEN;
/// Connector entries
pub const MAX_CONNECTORS: usize = 32;
/// One `CSMI_SAS_CONNECTOR_INFO` entry
pub const CONNECTOR_LEN: usize = 36;
/// `CSMI_SAS_CONNECTOR_INFO_BUFFER` payload size
pub const CONNECTOR_INFO_LEN: usize = MAX_CONNECTORS * CONNECTOR_LEN;

/// Use the port identifier instead of the phy
pub const USE_PORT_IDENTIFIER: u8 = 0xFF;
/// Let the driver choose the port
pub const IGNORE_PORT: u8 = 0x7F;

bitflags! {
    /// Initiator/target port protocols
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PortProtocol: u8 {
        /// SATA (direct attached)
        const SATA = 0x01;
        /// SMP
        const SMP = 0x02;
        /// STP
        const STP = 0x04;
        /// SSP
        const SSP = 0x08;
    }
}

impl PortProtocol {
    /// ATA is reachable
    pub fn is_ata(&self) -> bool {
        self.intersects(PortProtocol::SATA | PortProtocol::STP)
    }
}

// =============================================================================
// PHY INFO
// =============================================================================

/// `CSMI_SAS_IDENTIFY`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SasIdentify {
    /// Device type
    pub device_type: SasDeviceType,
    /// Initiator protocols
    pub initiator_protocol: PortProtocol,
    /// Target protocols
    pub target_protocol: PortProtocol,
    /// SAS address
    pub sas_address: SasAddress,
    /// Phy identifier
    pub phy_identifier: u8,
    /// Signal class
    pub signal_class: u8,
}

impl SasIdentify {
    fn decode(b: &[u8]) -> Self {
        Self {
            device_type: SasDeviceType::from_identify_byte(b[0]),
            initiator_protocol: PortProtocol::from_bits_retain(b[2]),
            target_protocol: PortProtocol::from_bits_retain(b[3]),
            sas_address: SasAddress(bytes8(b, 12)),
            phy_identifier: b[20],
            signal_class: b[21],
        }
    }
}

/// `CSMI_SAS_PHY_ENTITY`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyEntity {
    /// Index within the phy table
    pub index: u8,
    /// Local identify
    pub identify: SasIdentify,
    /// Port identifier
    pub port_identifier: u8,
    /// Negotiated link rate
    pub negotiated_link_rate: SasLinkRate,
    /// Minimum link rate
    pub minimum_link_rate: u8,
    /// Maximum link rate
    pub maximum_link_rate: u8,
    /// Phy change count
    pub phy_change_count: u8,
    /// Auto-discover state
    pub auto_discover: u8,
    /// Phy features
    pub phy_features: u8,
    /// Attached device identify
    pub attached: SasIdentify,
}

impl PhyEntity {
    fn decode(index: u8, e: &[u8]) -> Self {
        Self {
            index,
            identify: SasIdentify::decode(&e[0..IDENTIFY_LEN]),
            port_identifier: e[28],
            negotiated_link_rate: SasLinkRate::from_byte(e[29]),
            minimum_link_rate: e[30],
            maximum_link_rate: e[31],
            phy_change_count: e[32],
            auto_discover: e[33],
            phy_features: e[34],
            attached: SasIdentify::decode(&e[36..36 + IDENTIFY_LEN]),
        }
    }

    /// An end device is attached
    pub fn has_end_device(&self) -> bool {
        self.attached.device_type == SasDeviceType::EndDevice
    }
}

/// Phy table snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyInfo {
    /// Phys reported by the driver
    pub number_of_phys: u8,
    /// Decoded entries, at most `MAX_PHYS`
    pub phys: Vec<PhyEntity>,
}

impl PhyInfo {
    /// Decode; any bytes past `PHY_INFO_LEN` are ignored
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("phy info", buf, PHY_INFO_LEN)?;
        let number_of_phys = buf[0];
        let phys = buf[4..PHY_INFO_LEN]
            .chunks_exact(PHY_ENTITY_LEN)
            .take((number_of_phys as usize).min(MAX_PHYS))
            .enumerate()
            .map(|(i, e)| PhyEntity::decode(i as u8, e))
            .collect();
        Ok(Self { number_of_phys, phys })
    }

    /// Phys whose attached device carries `addr`
    pub fn find_attached(&self, addr: &SasAddress) -> impl Iterator<Item = &PhyEntity> + '_ {
        let addr = *addr;
        self.phys
            .iter()
            .filter(move |p| p.has_end_device() && p.attached.sas_address == addr)
    }

    /// Entry with the given phy identifier
    pub fn phy(&self, phy_identifier: u8) -> Option<&PhyEntity> {
        self.phys
            .iter()
            .find(|p| p.identify.phy_identifier == phy_identifier)
    }

    /// Phys with an end device attached
    pub fn end_devices(&self) -> impl Iterator<Item = &PhyEntity> + '_ {
        self.phys.iter().filter(|p| p.has_end_device())
    }
}

// =============================================================================
// LINK ERRORS
// =============================================================================

/// `CSMI_SAS_LINK_ERRORS`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkErrors {
    /// Phy identifier
    pub phy_identifier: u8,
    /// Invalid dword count
    pub invalid_dword_count: u32,
    /// Running disparity error count
    pub running_disparity_error_count: u32,
    /// Loss of dword sync count
    pub loss_of_dword_sync_count: u32,
    /// Phy reset problem count
    pub phy_reset_problem_count: u32,
}

/// Fill the request fields of a link errors payload
pub fn encode_link_errors_request(payload: &mut [u8], phy: u8, reset: bool) {
    payload[0] = phy;
    payload[1] = reset as u8;
}

impl LinkErrors {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("link errors", buf, LINK_ERRORS_LEN)?;
        Ok(Self {
            phy_identifier: buf[0],
            invalid_dword_count: le_u32(buf, 4),
            running_disparity_error_count: le_u32(buf, 8),
            loss_of_dword_sync_count: le_u32(buf, 12),
            phy_reset_problem_count: le_u32(buf, 16),
        })
    }
}

// =============================================================================
// SATA SIGNATURE
// =============================================================================

/// Initial D2H FIS a SATA device sent after reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SataSignature {
    /// Phy identifier
    pub phy_identifier: u8,
    /// Signature FIS
    pub fis: [u8; REGISTER_FIS_LEN],
}

impl SataSignature {
    /// Decode from payload bytes
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("sata signature", buf, SATA_SIGNATURE_LEN)?;
        let mut fis = [0u8; REGISTER_FIS_LEN];
        fis.copy_from_slice(&buf[4..4 + REGISTER_FIS_LEN]);
        Ok(Self {
            phy_identifier: buf[0],
            fis,
        })
    }

    /// Port multiplier port
    pub fn pm_port(&self) -> u8 {
        self.fis[1] & 0x0F
    }

    /// Signature identifies an ATAPI device
    pub fn is_atapi(&self) -> bool {
        self.fis[5] == 0x14 && self.fis[6] == 0xEB
    }
}

// =============================================================================
// CONNECTOR INFO
// =============================================================================

bitflags! {
    /// Connector location
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnectorLocation: u8 {
        /// Internal
        const INTERNAL = 0x02;
        /// External
        const EXTERNAL = 0x04;
        /// Switchable
        const SWITCHABLE = 0x08;
        /// Automatic
        const AUTO = 0x10;
        /// Not present
        const NOT_PRESENT = 0x20;
        /// Not connected
        const NOT_CONNECTED = 0x80;
    }
}

/// One connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    /// Pinout bitmap
    pub pinout: u32,
    /// Connector name
    pub connector: String,
    /// Location
    pub location: ConnectorLocation,
}

/// Connector table, one entry per phy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorInfo {
    /// Entries
    pub connectors: Vec<Connector>,
}

impl ConnectorInfo {
    /// Decode from payload bytes; unused slots are dropped
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("connector info", buf, CONNECTOR_INFO_LEN)?;
        let connectors = buf[..CONNECTOR_INFO_LEN]
            .chunks_exact(CONNECTOR_LEN)
            .map(|c| Connector {
                pinout: le_u32(c, 0),
                connector: ascii(&c[4..20]),
                location: ConnectorLocation::from_bits_retain(c[20]),
            })
            .filter(|c| c.pinout != 0 || !c.connector.is_empty() || !c.location.is_empty())
            .collect();
        Ok(Self { connectors })
    }
}

const_assert_eq!(PHY_INFO_LEN, 2052);
const_assert_eq!(SATA_SIGNATURE_LEN, 24);
const_assert_eq!(CONNECTOR_INFO_LEN, 1152);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioctl::put_u32;

    fn entity(buf: &mut [u8], i: usize, port: u8, addr: u64, target: u8) {
        let e = &mut buf[4 + i * PHY_ENTITY_LEN..][..PHY_ENTITY_LEN];
        e[0] = SasDeviceType::EndDevice.to_identify_byte();
        e[2] = PortProtocol::SSP.bits();
        e[20] = i as u8;
        e[28] = port;
        e[29] = 0x0A;
        e[36] = SasDeviceType::EndDevice.to_identify_byte();
        e[39] = target;
        e[48..56].copy_from_slice(&addr.to_be_bytes());
        e[56] = 0;
    }

    #[test]
    fn test_phy_info_offsets() {
        let mut buf = vec![0u8; PHY_INFO_LEN + PHY_INFO_SLACK];
        buf[0] = 2;
        entity(&mut buf, 0, 0, 0x5000_0000_0000_0001, PortProtocol::STP.bits());
        entity(&mut buf, 1, 1, 0x5000_0000_0000_0002, PortProtocol::SSP.bits());
        // Slack bytes past the structure must not leak into the decode
        buf[PHY_INFO_LEN..].fill(0xAA);

        let info = PhyInfo::decode(&buf).unwrap();
        assert_eq!(info.phys.len(), 2);
        let p1 = &info.phys[1];
        assert_eq!(p1.port_identifier, 1);
        assert_eq!(p1.negotiated_link_rate, SasLinkRate::Rate6_0);
        assert_eq!(p1.attached.target_protocol, PortProtocol::SSP);
        assert_eq!(p1.attached.sas_address, SasAddress::from_u64(0x5000_0000_0000_0002));
        assert!(info.phys[0].attached.target_protocol.is_ata());

        let addr = SasAddress::from_u64(0x5000_0000_0000_0001);
        assert_eq!(info.find_attached(&addr).count(), 1);
        assert_eq!(info.phy(1).map(|p| p.index), Some(1));
    }

    #[test]
    fn test_phy_count_capped() {
        let mut buf = vec![0u8; PHY_INFO_LEN];
        buf[0] = 200;
        assert_eq!(PhyInfo::decode(&buf).unwrap().phys.len(), MAX_PHYS);
    }

    #[test]
    fn test_link_errors() {
        let mut buf = [0u8; LINK_ERRORS_LEN];
        encode_link_errors_request(&mut buf, 3, true);
        assert_eq!(&buf[..2], &[3, 1]);
        put_u32(&mut buf, 4, 10);
        put_u32(&mut buf, 16, 40);
        let errs = LinkErrors::decode(&buf).unwrap();
        assert_eq!(errs.phy_identifier, 3);
        assert_eq!(errs.invalid_dword_count, 10);
        assert_eq!(errs.phy_reset_problem_count, 40);
    }

    #[test]
    fn test_sata_signature_pm_port() {
        let mut buf = [0u8; SATA_SIGNATURE_LEN];
        buf[0] = 4;
        buf[4] = 0x34;
        buf[5] = 0x2B;
        let sig = SataSignature::decode(&buf).unwrap();
        assert_eq!(sig.phy_identifier, 4);
        assert_eq!(sig.pm_port(), 0x0B);
        assert!(!sig.is_atapi());
    }

    #[test]
    fn test_connector_info() {
        let mut buf = vec![0u8; CONNECTOR_INFO_LEN];
        put_u32(&mut buf, 0, 0x0F);
        buf[4..12].copy_from_slice(b"SFF-8643");
        buf[20] = ConnectorLocation::INTERNAL.bits();
        let info = ConnectorInfo::decode(&buf).unwrap();
        assert_eq!(info.connectors.len(), 1);
        assert_eq!(info.connectors[0].connector, "SFF-8643");
        assert_eq!(info.connectors[0].location, ConnectorLocation::INTERNAL);
    }
}
