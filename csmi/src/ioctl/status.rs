//! CSMI return codes
//!
//! Drivers report the protocol outcome in the header `ReturnCode` field.
//! The table below is consulted top to bottom; any code it does not list
//! is a failure, so normalization is total.

use core::fmt;

use crate::error::{CsmiError, CsmiResult};

/// Raw CSMI return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub u32);

impl ReturnCode {
    /// Success
    pub const SUCCESS: Self = Self(0);
    /// Generic failure
    pub const FAILED: Self = Self(1);
    /// Control code not recognized
    pub const BAD_CNTL_CODE: Self = Self(2);
    /// Invalid parameter
    pub const INVALID_PARAMETER: Self = Self(3);
    /// Write attempted while the driver is read-only
    pub const WRITE_ATTEMPTED: Self = Self(4);

    /// RAID set index out of range
    pub const RAID_SET_OUT_OF_RANGE: Self = Self(1000);
    /// RAID buffer too small
    pub const RAID_SET_BUFFER_TOO_SMALL: Self = Self(1001);
    /// RAID data changed since the last query
    pub const RAID_SET_DATA_CHANGED: Self = Self(1002);

    /// Phy settings cannot be changed
    pub const PHY_INFO_NOT_CHANGEABLE: Self = Self(2000);
    /// Link rate out of range
    pub const LINK_RATE_OUT_OF_RANGE: Self = Self(2001);
    /// Phy does not exist
    pub const PHY_DOES_NOT_EXIST: Self = Self(2002);
    /// Phy does not match port
    pub const PHY_DOES_NOT_MATCH_PORT: Self = Self(2003);
    /// Phy cannot be selected
    pub const PHY_CANNOT_BE_SELECTED: Self = Self(2004);
    /// Select phy or port, not both
    pub const SELECT_PHY_OR_PORT: Self = Self(2005);
    /// Port does not exist
    pub const PORT_DOES_NOT_EXIST: Self = Self(2006);
    /// Port cannot be selected
    pub const PORT_CANNOT_BE_SELECTED: Self = Self(2007);
    /// Connection failed
    pub const CONNECTION_FAILED: Self = Self(2008);
    /// No SATA device
    pub const NO_SATA_DEVICE: Self = Self(2009);
    /// No SATA signature
    pub const NO_SATA_SIGNATURE: Self = Self(2010);
    /// Driver emulates SCSI for this device; STP is unavailable
    pub const SCSI_EMULATION: Self = Self(2011);
    /// Not an end device
    pub const NOT_AN_END_DEVICE: Self = Self(2012);
    /// No SCSI address
    pub const NO_SCSI_ADDRESS: Self = Self(2013);
    /// No device address
    pub const NO_DEVICE_ADDRESS: Self = Self(2014);

    /// Symbolic name, if defined
    pub fn name(&self) -> Option<&'static str> {
        RETURN_CODES
            .iter()
            .find(|(code, _, _)| code == self)
            .map(|(_, name, _)| *name)
    }

    /// Map to the normalized outcome
    pub fn normalize(&self) -> Normalized {
        RETURN_CODES
            .iter()
            .find(|(code, _, _)| code == self)
            .map(|(_, _, outcome)| *outcome)
            .unwrap_or(Normalized::Failure)
    }

    /// Convert into a result
    pub fn into_result(self) -> CsmiResult<()> {
        match self.normalize() {
            Normalized::Success => Ok(()),
            Normalized::NotSupported => Err(CsmiError::NotSupported { code: self }),
            Normalized::PermissionDenied => Err(CsmiError::PermissionDenied { code: self }),
            Normalized::Failure => Err(CsmiError::Failed { code: self }),
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "UNKNOWN ({})", self.0),
        }
    }
}

/// Outcome classes a return code collapses to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    /// Operation succeeded
    Success,
    /// Driver or device does not support the request
    NotSupported,
    /// Driver refused a write
    PermissionDenied,
    /// Anything else
    Failure,
}

const RETURN_CODES: &[(ReturnCode, &str, Normalized)] = &[
    (ReturnCode::SUCCESS, "SUCCESS", Normalized::Success),
    (ReturnCode::FAILED, "FAILED", Normalized::Failure),
    (ReturnCode::BAD_CNTL_CODE, "BAD_CNTL_CODE", Normalized::NotSupported),
    (ReturnCode::INVALID_PARAMETER, "INVALID_PARAMETER", Normalized::NotSupported),
    (ReturnCode::WRITE_ATTEMPTED, "WRITE_ATTEMPTED", Normalized::PermissionDenied),
    (ReturnCode::RAID_SET_OUT_OF_RANGE, "RAID_SET_OUT_OF_RANGE", Normalized::Failure),
    (ReturnCode::RAID_SET_BUFFER_TOO_SMALL, "RAID_SET_BUFFER_TOO_SMALL", Normalized::Failure),
    (ReturnCode::RAID_SET_DATA_CHANGED, "RAID_SET_DATA_CHANGED", Normalized::Success),
    (ReturnCode::PHY_INFO_NOT_CHANGEABLE, "PHY_INFO_NOT_CHANGEABLE", Normalized::NotSupported),
    (ReturnCode::LINK_RATE_OUT_OF_RANGE, "LINK_RATE_OUT_OF_RANGE", Normalized::Failure),
    (ReturnCode::PHY_DOES_NOT_EXIST, "PHY_DOES_NOT_EXIST", Normalized::Failure),
    (ReturnCode::PHY_DOES_NOT_MATCH_PORT, "PHY_DOES_NOT_MATCH_PORT", Normalized::Failure),
    (ReturnCode::PHY_CANNOT_BE_SELECTED, "PHY_CANNOT_BE_SELECTED", Normalized::Failure),
    (ReturnCode::SELECT_PHY_OR_PORT, "SELECT_PHY_OR_PORT", Normalized::Failure),
    (ReturnCode::PORT_DOES_NOT_EXIST, "PORT_DOES_NOT_EXIST", Normalized::Failure),
    (ReturnCode::PORT_CANNOT_BE_SELECTED, "PORT_CANNOT_BE_SELECTED", Normalized::NotSupported),
    (ReturnCode::CONNECTION_FAILED, "CONNECTION_FAILED", Normalized::Failure),
    (ReturnCode::NO_SATA_DEVICE, "NO_SATA_DEVICE", Normalized::Failure),
    (ReturnCode::NO_SATA_SIGNATURE, "NO_SATA_SIGNATURE", Normalized::NotSupported),
    (ReturnCode::SCSI_EMULATION, "SCSI_EMULATION", Normalized::NotSupported),
    (ReturnCode::NOT_AN_END_DEVICE, "NOT_AN_END_DEVICE", Normalized::Failure),
    (ReturnCode::NO_SCSI_ADDRESS, "NO_SCSI_ADDRESS", Normalized::NotSupported),
    (ReturnCode::NO_DEVICE_ADDRESS, "NO_DEVICE_ADDRESS", Normalized::NotSupported),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_table() {
        assert_eq!(ReturnCode::SUCCESS.normalize(), Normalized::Success);
        assert_eq!(ReturnCode::RAID_SET_DATA_CHANGED.normalize(), Normalized::Success);
        for code in [
            ReturnCode::BAD_CNTL_CODE,
            ReturnCode::INVALID_PARAMETER,
            ReturnCode::PHY_INFO_NOT_CHANGEABLE,
            ReturnCode::PORT_CANNOT_BE_SELECTED,
            ReturnCode::NO_SATA_SIGNATURE,
            ReturnCode::SCSI_EMULATION,
            ReturnCode::NO_SCSI_ADDRESS,
            ReturnCode::NO_DEVICE_ADDRESS,
        ] {
            assert_eq!(code.normalize(), Normalized::NotSupported, "{code}");
        }
        assert_eq!(ReturnCode::WRITE_ATTEMPTED.normalize(), Normalized::PermissionDenied);
        assert_eq!(ReturnCode::FAILED.normalize(), Normalized::Failure);
        assert_eq!(ReturnCode::CONNECTION_FAILED.normalize(), Normalized::Failure);
    }

    #[test]
    fn test_mapping_is_total() {
        for raw in (0..3000).chain([u32::MAX, 0xDEAD_BEEF]) {
            let code = ReturnCode(raw);
            let first = code.normalize();
            assert_eq!(first, code.normalize());
            if code.name().is_none() {
                assert_eq!(first, Normalized::Failure);
            }
        }
    }

    #[test]
    fn test_write_attempted_is_permission_denied() {
        assert!(matches!(
            ReturnCode::WRITE_ATTEMPTED.into_result(),
            Err(CsmiError::PermissionDenied { code }) if code == ReturnCode::WRITE_ATTEMPTED
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(ReturnCode::SCSI_EMULATION.to_string(), "SCSI_EMULATION (2011)");
        assert_eq!(ReturnCode(77).to_string(), "UNKNOWN (77)");
    }
}
