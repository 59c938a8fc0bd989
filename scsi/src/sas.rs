//! SAS addressing and link parameters

use core::fmt;

/// SAS address (8 bytes, big-endian NAA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct SasAddress(pub [u8; 8]);

impl SasAddress {
    /// All-zero address
    pub const ZERO: SasAddress = SasAddress([0u8; 8]);

    /// Create from bytes
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Copy from the first 8 bytes of a slice
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
        Some(Self(array))
    }

    /// Create from u64
    pub const fn from_u64(val: u64) -> Self {
        Self(val.to_be_bytes())
    }

    /// Convert to u64
    pub fn to_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Address is all zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 8]
    }
}

impl fmt::Display for SasAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3],
            self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

/// SAS device type (IDENTIFY address frame bits 6:4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SasDeviceType {
    /// No device attached
    NoDevice = 0,
    /// End device
    EndDevice = 1,
    /// Edge expander
    EdgeExpander = 2,
    /// Fanout expander
    FanoutExpander = 3,
}

impl SasDeviceType {
    /// Decode from an identify device-type byte
    pub const fn from_identify_byte(byte: u8) -> Self {
        match (byte >> 4) & 0x07 {
            1 => SasDeviceType::EndDevice,
            2 => SasDeviceType::EdgeExpander,
            3 => SasDeviceType::FanoutExpander,
            _ => SasDeviceType::NoDevice,
        }
    }

    /// Encode into an identify device-type byte
    pub const fn to_identify_byte(self) -> u8 {
        (self as u8) << 4
    }
}

/// SAS link rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SasLinkRate {
    /// Unknown
    Unknown = 0,
    /// Disabled
    Disabled = 1,
    /// Reset problem
    ResetProblem = 2,
    /// Spin-up hold
    SpinupHold = 3,
    /// Port selector
    PortSelector = 4,
    /// 1.5 Gbps
    Rate1_5 = 8,
    /// 3.0 Gbps
    Rate3_0 = 9,
    /// 6.0 Gbps
    Rate6_0 = 10,
    /// 12.0 Gbps
    Rate12_0 = 11,
    /// 22.5 Gbps
    Rate22_5 = 12,
}

impl SasLinkRate {
    /// Decode from the low nibble of a link-rate byte
    pub const fn from_byte(byte: u8) -> Self {
        match byte & 0x0F {
            1 => SasLinkRate::Disabled,
            2 => SasLinkRate::ResetProblem,
            3 => SasLinkRate::SpinupHold,
            4 => SasLinkRate::PortSelector,
            8 => SasLinkRate::Rate1_5,
            9 => SasLinkRate::Rate3_0,
            10 => SasLinkRate::Rate6_0,
            11 => SasLinkRate::Rate12_0,
            12 => SasLinkRate::Rate22_5,
            _ => SasLinkRate::Unknown,
        }
    }

    /// Get speed in Mbps
    pub const fn speed_mbps(&self) -> u32 {
        match self {
            SasLinkRate::Rate1_5 => 1500,
            SasLinkRate::Rate3_0 => 3000,
            SasLinkRate::Rate6_0 => 6000,
            SasLinkRate::Rate12_0 => 12000,
            SasLinkRate::Rate22_5 => 22500,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sas_address() {
        let addr = SasAddress::from_u64(0x5000C5000BADF00D);
        assert!(!addr.is_zero());
        assert_eq!(addr.to_u64(), 0x5000C5000BADF00D);
        assert_eq!(addr.to_string(), "50:00:C5:00:0B:AD:F0:0D");
        assert!(SasAddress::ZERO.is_zero());
        assert_eq!(SasAddress::from_slice(&[1, 2, 3]), None);
    }

    #[test]
    fn test_device_type_nibble() {
        assert_eq!(SasDeviceType::from_identify_byte(0x10), SasDeviceType::EndDevice);
        assert_eq!(SasDeviceType::from_identify_byte(0x20), SasDeviceType::EdgeExpander);
        assert_eq!(SasDeviceType::EndDevice.to_identify_byte(), 0x10);
    }

    #[test]
    fn test_sas_link_rate() {
        assert_eq!(SasLinkRate::from_byte(0x0A), SasLinkRate::Rate6_0);
        assert_eq!(SasLinkRate::Rate6_0.speed_mbps(), 6000);
        assert_eq!(SasLinkRate::from_byte(0x0B).speed_mbps(), 12000);
    }
}
