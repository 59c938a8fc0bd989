//! Driver classification and quirks
//!
//! Controller drivers differ in which CSMI calls they answer correctly.
//! Drivers are classified once by substring match on the driver name; the
//! table is ordered so specific names match before their family prefix.

use bitflags::bitflags;

/// Driver family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverFamily {
    /// Intel VROC
    IntelVroc,
    /// Intel RST
    IntelRst,
    /// Other Intel storage driver
    IntelGeneric,
    /// AMD RAIDXpert
    AmdRcRaid,
    /// HPE Smart Array (CISS)
    HpCiss,
    /// HPE SAS
    HpSamd,
    /// Adaptec/Microsemi
    ArcSas,
    /// Anything else
    Unknown,
}

/// Ordered (substring, family) pairs
const CLASSIFICATION: &[(&str, DriverFamily)] = &[
    ("iaVROC", DriverFamily::IntelVroc),
    ("iaStorVD", DriverFamily::IntelVroc),
    ("iaStorAC", DriverFamily::IntelRst),
    ("iaStorAV", DriverFamily::IntelRst),
    ("iaStorA", DriverFamily::IntelRst),
    ("iaStorE", DriverFamily::IntelRst),
    ("iaStor", DriverFamily::IntelGeneric),
    ("rcraid", DriverFamily::AmdRcRaid),
    ("HpCISSs", DriverFamily::HpCiss),
    ("HpSAMD", DriverFamily::HpSamd),
    ("arcsas", DriverFamily::ArcSas),
];

impl DriverFamily {
    /// Classify a driver name
    pub fn classify(driver_name: &str) -> Self {
        CLASSIFICATION
            .iter()
            .find(|(needle, _)| driver_name.contains(needle))
            .map(|(_, family)| *family)
            .unwrap_or(DriverFamily::Unknown)
    }

    /// Intel storage driver of any kind
    pub fn is_intel(&self) -> bool {
        matches!(
            self,
            DriverFamily::IntelVroc | DriverFamily::IntelRst | DriverFamily::IntelGeneric
        )
    }

    /// Quirks that apply to this family
    pub fn quirks(&self) -> DriverQuirks {
        let mut quirks = DriverQuirks::default();
        match self {
            DriverFamily::IntelVroc | DriverFamily::IntelRst => {
                quirks.zero_sas_address_valid = true;
                quirks.nvme_address_in_sas_address = true;
            }
            DriverFamily::IntelGeneric => quirks.zero_sas_address_valid = true,
            DriverFamily::HpCiss => quirks.skip_device_address_query = true,
            DriverFamily::AmdRcRaid => quirks.raid_set_index_base = 1,
            _ => {}
        }
        quirks
    }

    /// Vendor capabilities implied by the family
    pub fn capabilities(&self) -> VendorCapabilities {
        match self {
            DriverFamily::IntelVroc | DriverFamily::IntelRst => {
                VendorCapabilities::INTEL_NVME_PASSTHROUGH
            }
            _ => VendorCapabilities::empty(),
        }
    }
}

/// Behaviour switches consulted at fixed decision points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverQuirks {
    /// Device-address translation hangs; use the RAID config scan instead
    pub skip_device_address_query: bool,
    /// SATA RAID members legitimately report an all-zero SAS address
    pub zero_sas_address_valid: bool,
    /// NVMe devices behind RAID carry path/target/lun in the SAS address
    pub nvme_address_in_sas_address: bool,
    /// First RAID set index
    pub raid_set_index_base: u32,
}

bitflags! {
    /// Vendor extensions available on a device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VendorCapabilities: u32 {
        /// Intel RST/VROC NVMe passthrough
        const INTEL_NVME_PASSTHROUGH = 0x01;
        /// Controller accepts firmware download
        const FIRMWARE_DOWNLOAD = 0x02;
    }
}

/// Access level granted to CSMI callers for a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityAccess {
    /// No CSMI access
    None,
    /// Information queries only
    Limited,
    /// Passthrough allowed, firmware download denied
    Restricted,
    /// Everything
    Full,
}

impl SecurityAccess {
    /// Information queries
    pub fn allows_info(&self) -> bool {
        *self >= SecurityAccess::Limited
    }

    /// Passthrough commands and counter resets
    pub fn allows_passthrough(&self) -> bool {
        *self >= SecurityAccess::Restricted
    }

    /// Firmware download
    pub fn allows_firmware(&self) -> bool {
        *self == SecurityAccess::Full
    }
}

/// SAS address bytes carrying an NVMe device's OS address
pub fn packed_nvme_address(path: u8, target: u8, lun: u8) -> [u8; 8] {
    [0, 0, 0, 0, 0, path, target, lun]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        assert_eq!(DriverFamily::classify("iaStorVD"), DriverFamily::IntelVroc);
        assert_eq!(DriverFamily::classify("iaVROC"), DriverFamily::IntelVroc);
        assert_eq!(DriverFamily::classify("iaStorAC"), DriverFamily::IntelRst);
        assert_eq!(DriverFamily::classify("iaStorAVC"), DriverFamily::IntelRst);
        assert_eq!(DriverFamily::classify("iaStorA"), DriverFamily::IntelRst);
        assert_eq!(DriverFamily::classify("iaStorE"), DriverFamily::IntelRst);
        assert_eq!(DriverFamily::classify("iaStorV"), DriverFamily::IntelGeneric);
        assert_eq!(DriverFamily::classify("iaStor"), DriverFamily::IntelGeneric);
        assert_eq!(DriverFamily::classify("rcraid"), DriverFamily::AmdRcRaid);
        assert_eq!(DriverFamily::classify("HpCISSs3"), DriverFamily::HpCiss);
        assert_eq!(DriverFamily::classify("HpSAMD"), DriverFamily::HpSamd);
        assert_eq!(DriverFamily::classify("arcsas"), DriverFamily::ArcSas);
        assert_eq!(DriverFamily::classify("megasas"), DriverFamily::Unknown);
        assert_eq!(DriverFamily::classify(""), DriverFamily::Unknown);
    }

    #[test]
    fn test_quirks() {
        let rst = DriverFamily::IntelRst.quirks();
        assert!(rst.zero_sas_address_valid && rst.nvme_address_in_sas_address);
        let generic = DriverFamily::IntelGeneric.quirks();
        assert!(generic.zero_sas_address_valid && !generic.nvme_address_in_sas_address);
        assert!(DriverFamily::HpCiss.quirks().skip_device_address_query);
        assert_eq!(DriverFamily::AmdRcRaid.quirks().raid_set_index_base, 1);
        assert_eq!(DriverFamily::Unknown.quirks(), DriverQuirks::default());
        let none = DriverQuirks::default();
        assert!(!none.skip_device_address_query && !none.zero_sas_address_valid);
        assert!(!none.nvme_address_in_sas_address);
        assert_eq!(none.raid_set_index_base, 0);
        assert!(DriverFamily::IntelVroc
            .capabilities()
            .contains(VendorCapabilities::INTEL_NVME_PASSTHROUGH));
    }

    #[test]
    fn test_security_levels() {
        assert!(!SecurityAccess::None.allows_info());
        assert!(SecurityAccess::Limited.allows_info());
        assert!(!SecurityAccess::Limited.allows_passthrough());
        assert!(SecurityAccess::Restricted.allows_passthrough());
        assert!(!SecurityAccess::Restricted.allows_firmware());
        assert!(SecurityAccess::Full.allows_firmware());
    }

    #[test]
    fn test_packed_nvme_address() {
        assert_eq!(packed_nvme_address(1, 2, 3), [0, 0, 0, 0, 0, 1, 2, 3]);
    }
}
