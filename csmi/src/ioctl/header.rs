//! IOCTL header layouts
//!
//! ```text
//! Windows SRB_IO_CONTROL (28 bytes)      Linux IOCTL_HEADER (20 bytes)
//! ┌────┬──────────────┐                  ┌────┬──────────────────────┐
//! │  0 │ HeaderLength │                  │  0 │ IOControllerNumber   │
//! │  4 │ Signature[8] │                  │  4 │ Length               │
//! │ 12 │ Timeout      │                  │  8 │ ReturnCode           │
//! │ 16 │ ControlCode  │                  │ 12 │ Timeout              │
//! │ 20 │ ReturnCode   │                  │ 16 │ Direction (u16) + pad│
//! │ 24 │ Length       │                  └────┴──────────────────────┘
//! └────┴──────────────┘
//! ```
//!
//! `Length` is always the payload length, excluding the header.

use core::time::Duration;

use cfg_if::cfg_if;

use super::{le_u32, put_u16, put_u32, ControlCode, Direction, Signature};
use crate::ioctl::status::ReturnCode;

/// Fields written into a header before issuing
#[derive(Debug, Clone, Copy)]
pub struct HeaderFields {
    /// Operation
    pub control_code: ControlCode,
    /// Sub-API signature
    pub signature: Signature,
    /// Driver-side timeout
    pub timeout: Duration,
    /// Payload bytes following the header
    pub payload_len: u32,
    /// Controller number (Linux only)
    pub controller: u32,
    /// Data direction (Linux only)
    pub direction: Direction,
}

/// A platform header layout
pub trait IoctlHeaderLayout {
    /// Header size in bytes
    const LEN: usize;

    /// Write the header fields; the region must already be zeroed
    fn write(buf: &mut [u8], fields: &HeaderFields);

    /// Protocol return code
    fn return_code(buf: &[u8]) -> ReturnCode;

    /// Store a return code (driver side)
    fn set_return_code(buf: &mut [u8], code: ReturnCode);

    /// Payload length field
    fn payload_len(buf: &[u8]) -> u32;

    /// Store the payload length field (driver side)
    fn set_payload_len(buf: &mut [u8], len: u32);
}

/// Windows `SRB_IO_CONTROL`
#[derive(Debug)]
pub struct SrbIoControl;

impl SrbIoControl {
    const RETURN_CODE: usize = 20;
    const LENGTH: usize = 24;
}

impl IoctlHeaderLayout for SrbIoControl {
    const LEN: usize = 28;

    fn write(buf: &mut [u8], fields: &HeaderFields) {
        put_u32(buf, 0, Self::LEN as u32);
        buf[4..12].copy_from_slice(&fields.signature.0);
        put_u32(buf, 12, fields.timeout.as_secs() as u32);
        put_u32(buf, 16, fields.control_code.code());
        put_u32(buf, Self::LENGTH, fields.payload_len);
    }

    fn return_code(buf: &[u8]) -> ReturnCode {
        ReturnCode(le_u32(buf, Self::RETURN_CODE))
    }

    fn set_return_code(buf: &mut [u8], code: ReturnCode) {
        put_u32(buf, Self::RETURN_CODE, code.0);
    }

    fn payload_len(buf: &[u8]) -> u32 {
        le_u32(buf, Self::LENGTH)
    }

    fn set_payload_len(buf: &mut [u8], len: u32) {
        put_u32(buf, Self::LENGTH, len);
    }
}

/// Linux `IOCTL_HEADER`
#[derive(Debug)]
pub struct CsmiIoctlHeader;

impl CsmiIoctlHeader {
    const LENGTH: usize = 4;
    const RETURN_CODE: usize = 8;
}

impl IoctlHeaderLayout for CsmiIoctlHeader {
    const LEN: usize = 20;

    fn write(buf: &mut [u8], fields: &HeaderFields) {
        put_u32(buf, 0, fields.controller);
        put_u32(buf, Self::LENGTH, fields.payload_len);
        put_u32(buf, 12, fields.timeout.as_secs() as u32);
        put_u16(buf, 16, fields.direction as u16);
    }

    fn return_code(buf: &[u8]) -> ReturnCode {
        ReturnCode(le_u32(buf, Self::RETURN_CODE))
    }

    fn set_return_code(buf: &mut [u8], code: ReturnCode) {
        put_u32(buf, Self::RETURN_CODE, code.0);
    }

    fn payload_len(buf: &[u8]) -> u32 {
        le_u32(buf, Self::LENGTH)
    }

    fn set_payload_len(buf: &mut [u8], len: u32) {
        put_u32(buf, Self::LENGTH, len);
    }
}

cfg_if! {
    if #[cfg(windows)] {
        /// Header layout of the build target
        pub type NativeHeader = SrbIoControl;
    } else {
        /// Header layout of the build target
        pub type NativeHeader = CsmiIoctlHeader;
    }
}

/// Native header length
pub const HEADER_LEN: usize = <NativeHeader as IoctlHeaderLayout>::LEN;

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> HeaderFields {
        HeaderFields {
            control_code: ControlCode::RaidConfig,
            signature: Signature::RAID,
            timeout: Duration::from_secs(60),
            payload_len: 0x1234,
            controller: 3,
            direction: Direction::Write,
        }
    }

    #[test]
    fn test_srb_io_control_layout() {
        let mut buf = [0u8; 28];
        SrbIoControl::write(&mut buf, &fields());
        assert_eq!(le_u32(&buf, 0), 28);
        assert_eq!(&buf[4..12], b"CSMIARY\0");
        assert_eq!(le_u32(&buf, 12), 60);
        assert_eq!(le_u32(&buf, 16), 11);
        assert_eq!(le_u32(&buf, 20), 0);
        assert_eq!(SrbIoControl::payload_len(&buf), 0x1234);

        SrbIoControl::set_return_code(&mut buf, ReturnCode::SCSI_EMULATION);
        assert_eq!(SrbIoControl::return_code(&buf), ReturnCode::SCSI_EMULATION);
    }

    #[test]
    fn test_linux_header_layout() {
        let mut buf = [0u8; 20];
        CsmiIoctlHeader::write(&mut buf, &fields());
        assert_eq!(le_u32(&buf, 0), 3);
        assert_eq!(le_u32(&buf, 4), 0x1234);
        assert_eq!(le_u32(&buf, 8), 0);
        assert_eq!(le_u32(&buf, 12), 60);
        assert_eq!(&buf[16..20], &[1, 0, 0, 0]);

        CsmiIoctlHeader::set_return_code(&mut buf, ReturnCode::WRITE_ATTEMPTED);
        assert_eq!(CsmiIoctlHeader::return_code(&buf), ReturnCode::WRITE_ATTEMPTED);
    }
}
