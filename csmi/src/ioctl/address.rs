//! SAS/SCSI address translation payloads

use core::fmt;

use csmi_scsi::SasAddress;
use static_assertions::const_assert_eq;

use super::bytes8;
use crate::error::{check_len, CsmiResult};

/// `CSMI_SAS_GET_SCSI_ADDRESS_BUFFER` payload size
pub const GET_SCSI_ADDRESS_LEN: usize = 20;
/// `CSMI_SAS_GET_DEVICE_ADDRESS_BUFFER` payload size
pub const GET_DEVICE_ADDRESS_LEN: usize = 20;

/// OS SCSI address of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScsiAddress {
    /// Host adapter
    pub host: u8,
    /// Path (bus)
    pub path: u8,
    /// Target
    pub target: u8,
    /// LUN
    pub lun: u8,
}

impl fmt::Display for ScsiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.host, self.path, self.target, self.lun)
    }
}

/// Fill the request fields of a get-SCSI-address payload
pub fn encode_scsi_address_request(payload: &mut [u8], sas: &SasAddress, lun: &[u8; 8]) {
    payload[0..8].copy_from_slice(&sas.0);
    payload[8..16].copy_from_slice(lun);
}

/// Decode the translated SCSI address
pub fn decode_scsi_address(buf: &[u8]) -> CsmiResult<ScsiAddress> {
    check_len("scsi address", buf, GET_SCSI_ADDRESS_LEN)?;
    Ok(ScsiAddress {
        host: buf[16],
        path: buf[17],
        target: buf[18],
        lun: buf[19],
    })
}

/// Fill the request fields of a get-device-address payload
pub fn encode_device_address_request(payload: &mut [u8], addr: &ScsiAddress) {
    payload[0] = addr.host;
    payload[1] = addr.path;
    payload[2] = addr.target;
    payload[3] = addr.lun;
}

/// Decode the translated SAS address and LUN
pub fn decode_device_address(buf: &[u8]) -> CsmiResult<(SasAddress, [u8; 8])> {
    check_len("device address", buf, GET_DEVICE_ADDRESS_LEN)?;
    Ok((SasAddress(bytes8(buf, 4)), bytes8(buf, 12)))
}

const_assert_eq!(GET_SCSI_ADDRESS_LEN, 8 + 8 + 4);
const_assert_eq!(GET_DEVICE_ADDRESS_LEN, 4 + 8 + 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scsi_address_translation_layout() {
        let mut buf = [0u8; GET_SCSI_ADDRESS_LEN];
        let sas = SasAddress::from_u64(0x5000_C500_0000_0001);
        encode_scsi_address_request(&mut buf, &sas, &[0; 8]);
        assert_eq!(buf[0], 0x50);
        assert_eq!(buf[7], 0x01);
        buf[16..20].copy_from_slice(&[2, 0, 5, 0]);
        let addr = decode_scsi_address(&buf).unwrap();
        assert_eq!(addr, ScsiAddress { host: 2, path: 0, target: 5, lun: 0 });
        assert_eq!(addr.to_string(), "2:0:5:0");
    }

    #[test]
    fn test_device_address_translation_layout() {
        let mut buf = [0u8; GET_DEVICE_ADDRESS_LEN];
        let scsi = ScsiAddress {
            host: 1,
            path: 2,
            target: 3,
            lun: 4,
        };
        encode_device_address_request(&mut buf, &scsi);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        buf[4] = 0x50;
        buf[19] = 9;
        let (sas, lun) = decode_device_address(&buf).unwrap();
        assert_eq!(sas.0[0], 0x50);
        assert_eq!(lun[7], 9);
    }
}
