//! Firmware download payload
//!
//! The image is appended after the 44-byte download structure. Only the
//! header and the structure are zeroed; the image bytes are left alone.

use bitflags::bitflags;

use super::{le_u16, put_u32};
use crate::error::{check_len, CsmiResult};

/// `CSMI_SAS_FIRMWARE_DOWNLOAD` size
pub const FIRMWARE_DOWNLOAD_LEN: usize = 44;

bitflags! {
    /// Download options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FirmwareFlags: u32 {
        /// Validate the image only
        const VALIDATE = 0x01;
        /// Soft reset after download
        const SOFT_RESET = 0x02;
        /// Hard reset after download
        const HARD_RESET = 0x04;
    }
}

/// Download status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareStatus {
    /// Image accepted
    Success,
    /// Image rejected
    Failed,
    /// Download in progress
    Using,
    /// Image is older than the running firmware
    Old,
    /// Image is the running firmware
    Same,
    /// Image is newer than the running firmware
    Newer,
    /// Undefined value
    Other(u16),
}

impl FirmwareStatus {
    fn from_u16(raw: u16) -> Self {
        match raw {
            0 => FirmwareStatus::Success,
            1 => FirmwareStatus::Failed,
            2 => FirmwareStatus::Using,
            3 => FirmwareStatus::Old,
            4 => FirmwareStatus::Same,
            5 => FirmwareStatus::Newer,
            other => FirmwareStatus::Other(other),
        }
    }
}

/// Outcome reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareDownloadStatus {
    /// Status
    pub status: FirmwareStatus,
    /// Severity (0 info, 1 warning, 2 error, 3 fatal)
    pub severity: u16,
}

impl FirmwareDownloadStatus {
    /// Decode from the download structure
    pub fn decode(buf: &[u8]) -> CsmiResult<Self> {
        check_len("firmware download", buf, FIRMWARE_DOWNLOAD_LEN)?;
        Ok(Self {
            status: FirmwareStatus::from_u16(le_u16(buf, 40)),
            severity: le_u16(buf, 42),
        })
    }
}

/// Fill the download structure; `payload` starts at the structure
pub fn encode_firmware_request(payload: &mut [u8], image_len: u32, flags: FirmwareFlags) {
    payload[..FIRMWARE_DOWNLOAD_LEN].fill(0);
    put_u32(payload, 0, image_len);
    put_u32(payload, 4, flags.bits());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioctl::le_u32;

    #[test]
    fn test_request_preserves_image() {
        let mut buf = vec![0xEEu8; FIRMWARE_DOWNLOAD_LEN + 8];
        encode_firmware_request(&mut buf, 8, FirmwareFlags::VALIDATE | FirmwareFlags::SOFT_RESET);
        assert_eq!(le_u32(&buf, 0), 8);
        assert_eq!(le_u32(&buf, 4), 3);
        assert!(buf[8..FIRMWARE_DOWNLOAD_LEN].iter().all(|&b| b == 0));
        assert!(buf[FIRMWARE_DOWNLOAD_LEN..].iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn test_status_decode() {
        let mut buf = [0u8; FIRMWARE_DOWNLOAD_LEN];
        buf[40] = 5;
        buf[42] = 1;
        let st = FirmwareDownloadStatus::decode(&buf).unwrap();
        assert_eq!(st.status, FirmwareStatus::Newer);
        assert_eq!(st.severity, 1);
    }
}
