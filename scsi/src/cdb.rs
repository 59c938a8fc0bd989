//! Command Descriptor Blocks

use arrayvec::ArrayVec;

use crate::{opcode, ScsiError, MAX_CDB_LENGTH};

/// A CDB of 1..=40 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cdb(ArrayVec<u8, MAX_CDB_LENGTH>);

impl Cdb {
    /// Copy a CDB from a slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ScsiError> {
        if bytes.is_empty() {
            return Err(ScsiError::EmptyCdb);
        }
        let mut cdb = ArrayVec::new();
        cdb.try_extend_from_slice(bytes)
            .map_err(|_| ScsiError::CdbTooLong(bytes.len()))?;
        Ok(Self(cdb))
    }

    fn zeroed(len: usize) -> Self {
        let mut cdb = ArrayVec::new();
        cdb.extend(core::iter::repeat(0u8).take(len.min(MAX_CDB_LENGTH)));
        Self(cdb)
    }

    /// CDB bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Mutable CDB bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed CDB
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Operation code
    pub fn opcode(&self) -> u8 {
        self.0.first().copied().unwrap_or(0)
    }
}

// =============================================================================
// CDB BUILDERS
// =============================================================================

/// CDB builder for the commands issued during device probing
#[derive(Debug, Default)]
pub struct CdbBuilder;

impl CdbBuilder {
    /// Build TEST UNIT READY
    pub fn test_unit_ready() -> Cdb {
        Cdb::zeroed(6)
    }

    /// Build REQUEST SENSE
    pub fn request_sense(allocation_length: u8) -> Cdb {
        let mut cdb = Cdb::zeroed(6);
        let b = cdb.as_mut_slice();
        b[0] = opcode::REQUEST_SENSE;
        b[4] = allocation_length;
        cdb
    }

    /// Build INQUIRY
    pub fn inquiry(evpd: bool, page_code: u8, allocation_length: u16) -> Cdb {
        let mut cdb = Cdb::zeroed(6);
        let b = cdb.as_mut_slice();
        b[0] = opcode::INQUIRY;
        b[1] = if evpd { 0x01 } else { 0x00 };
        b[2] = page_code;
        b[3..5].copy_from_slice(&allocation_length.to_be_bytes());
        cdb
    }

    /// Build READ CAPACITY (10)
    pub fn read_capacity_10() -> Cdb {
        let mut cdb = Cdb::zeroed(10);
        cdb.as_mut_slice()[0] = opcode::READ_CAPACITY_10;
        cdb
    }

    /// Build READ (16)
    pub fn read_16(lba: u64, transfer_length: u32) -> Cdb {
        let mut cdb = Cdb::zeroed(16);
        let b = cdb.as_mut_slice();
        b[0] = opcode::READ_16;
        b[2..10].copy_from_slice(&lba.to_be_bytes());
        b[10..14].copy_from_slice(&transfer_length.to_be_bytes());
        cdb
    }

    /// Build WRITE (16)
    pub fn write_16(lba: u64, transfer_length: u32) -> Cdb {
        let mut cdb = Self::read_16(lba, transfer_length);
        cdb.as_mut_slice()[0] = opcode::WRITE_16;
        cdb
    }

    /// Build REPORT LUNS
    pub fn report_luns(select_report: u8, allocation_length: u32) -> Cdb {
        let mut cdb = Cdb::zeroed(12);
        let b = cdb.as_mut_slice();
        b[0] = opcode::REPORT_LUNS;
        b[2] = select_report;
        b[6..10].copy_from_slice(&allocation_length.to_be_bytes());
        cdb
    }

    /// Start a zeroed CDB of the given length for custom encodings
    pub fn raw(len: usize) -> Cdb {
        Cdb::zeroed(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdb_limits() {
        assert_eq!(Cdb::from_slice(&[]), Err(ScsiError::EmptyCdb));
        assert_eq!(Cdb::from_slice(&[0u8; 41]), Err(ScsiError::CdbTooLong(41)));
        assert_eq!(Cdb::from_slice(&[0x7F; 32]).unwrap().len(), 32);
    }

    #[test]
    fn test_inquiry_vpd() {
        let cdb = CdbBuilder::inquiry(true, 0x80, 0x00FC);
        assert_eq!(cdb.as_slice(), &[0x12, 0x01, 0x80, 0x00, 0xFC, 0x00]);
    }

    #[test]
    fn test_read_16() {
        let cdb = CdbBuilder::read_16(0x0102_0304_0506_0708, 0x10);
        assert_eq!(cdb.opcode(), opcode::READ_16);
        assert_eq!(&cdb.as_slice()[2..10], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(cdb.as_slice()[13], 0x10);
    }

    #[test]
    fn test_test_unit_ready() {
        let cdb = CdbBuilder::test_unit_ready();
        assert_eq!(cdb.len(), 6);
        assert_eq!(cdb.opcode(), opcode::TEST_UNIT_READY);
    }
}
