//! Sense data
//!
//! Parses fixed and descriptor format sense, and builds descriptor format
//! sense carrying an ATA Status Return descriptor so an ATA completion can
//! be reported through layers that only understand SCSI.

use csmi_ata::AtaResultRegisters;

use crate::{asc, ascq, SenseKey, MAX_SENSE_LENGTH};

// =============================================================================
// SENSE DATA STRUCTURES
// =============================================================================

/// Sense data response format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseFormat {
    /// Fixed format sense data (70h, 71h)
    Fixed,
    /// Descriptor format sense data (72h, 73h)
    Descriptor,
}

/// Fixed format sense data (18 bytes minimum)
#[derive(Debug, Clone, Copy)]
pub struct FixedSenseData {
    /// Response code (70h or 71h)
    pub response_code: u8,
    /// Sense key, flags
    pub sense_key: u8,
    /// Information bytes
    pub information: [u8; 4],
    /// Additional sense length
    pub additional_length: u8,
    /// Command-specific information
    pub command_info: [u8; 4],
    /// Additional Sense Code
    pub asc: u8,
    /// Additional Sense Code Qualifier
    pub ascq: u8,
}

impl FixedSenseData {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 18 {
            return None;
        }

        Some(Self {
            response_code: data[0],
            sense_key: data[2],
            information: [data[3], data[4], data[5], data[6]],
            additional_length: data[7],
            command_info: [data[8], data[9], data[10], data[11]],
            asc: data[12],
            ascq: data[13],
        })
    }

    /// Get sense key
    pub fn sense_key(&self) -> SenseKey {
        SenseKey::from_byte(self.sense_key & 0x0F)
    }
}

/// Descriptor format sense data header
#[derive(Debug, Clone, Copy)]
pub struct DescriptorSenseHeader {
    /// Response code (72h or 73h)
    pub response_code: u8,
    /// Sense key
    pub sense_key: u8,
    /// Additional Sense Code
    pub asc: u8,
    /// Additional Sense Code Qualifier
    pub ascq: u8,
    /// Additional sense length
    pub additional_length: u8,
}

impl DescriptorSenseHeader {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }

        Some(Self {
            response_code: data[0],
            sense_key: data[1],
            asc: data[2],
            ascq: data[3],
            additional_length: data[7],
        })
    }

    /// Get sense key
    pub fn sense_key(&self) -> SenseKey {
        SenseKey::from_byte(self.sense_key & 0x0F)
    }
}

/// Sense descriptor types
pub mod sense_descriptor {
    /// Information
    pub const INFORMATION: u8 = 0x00;
    /// ATA status return
    pub const ATA_STATUS: u8 = 0x09;
    /// Additional length of the ATA status return descriptor
    pub const ATA_STATUS_LEN: u8 = 0x0C;
}

/// Walk the descriptors of descriptor format sense data
pub fn descriptors(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let end = DescriptorSenseHeader::from_bytes(data)
        .map(|h| (8 + h.additional_length as usize).min(data.len()))
        .unwrap_or(0);
    let mut offset = 8;
    core::iter::from_fn(move || {
        if offset + 2 > end {
            return None;
        }
        let code = data[offset];
        let len = 2 + data[offset + 1] as usize;
        if offset + len > end {
            return None;
        }
        let desc = &data[offset..offset + len];
        offset += len;
        Some((code, desc))
    })
}

// =============================================================================
// SENSE SUMMARY
// =============================================================================

/// Key, ASC and ASCQ regardless of format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenseSummary {
    /// Response format
    pub format: SenseFormat,
    /// Sense key
    pub sense_key: SenseKey,
    /// Additional sense code
    pub asc: u8,
    /// Additional sense code qualifier
    pub ascq: u8,
}

impl SenseSummary {
    /// Parse any supported sense format
    pub fn parse(data: &[u8]) -> Option<Self> {
        match data.first().map(|b| b & 0x7F)? {
            0x70 | 0x71 => {
                let fixed = FixedSenseData::from_bytes(data)?;
                Some(Self {
                    format: SenseFormat::Fixed,
                    sense_key: fixed.sense_key(),
                    asc: fixed.asc,
                    ascq: fixed.ascq,
                })
            }
            0x72 | 0x73 => {
                let header = DescriptorSenseHeader::from_bytes(data)?;
                Some(Self {
                    format: SenseFormat::Descriptor,
                    sense_key: header.sense_key(),
                    asc: header.asc,
                    ascq: header.ascq,
                })
            }
            _ => None,
        }
    }

    /// ILLEGAL REQUEST / INVALID COMMAND OPERATION CODE
    pub fn is_invalid_opcode(&self) -> bool {
        self.sense_key == SenseKey::IllegalRequest
            && self.asc == asc::INVALID_OPCODE
            && self.ascq == ascq::NONE
    }

    /// ATA PASS-THROUGH INFORMATION AVAILABLE
    pub fn is_ata_pass_through_info(&self) -> bool {
        self.asc == asc::NO_ADDITIONAL_SENSE && self.ascq == ascq::ATA_PASS_THROUGH_INFO
    }
}

// =============================================================================
// SENSE BUFFER
// =============================================================================

/// Owned sense data of at most `MAX_SENSE_LENGTH` bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseBuffer {
    bytes: [u8; MAX_SENSE_LENGTH],
    len: usize,
}

impl SenseBuffer {
    /// Empty buffer
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; MAX_SENSE_LENGTH],
            len: 0,
        }
    }

    /// Replace contents, truncating to capacity
    pub fn set(&mut self, data: &[u8]) {
        self.clear();
        let len = data.len().min(MAX_SENSE_LENGTH);
        self.bytes[..len].copy_from_slice(&data[..len]);
        self.len = len;
    }

    /// Zero the whole buffer
    pub fn clear(&mut self) {
        self.bytes = [0u8; MAX_SENSE_LENGTH];
        self.len = 0;
    }

    /// Valid bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// All bytes including the zeroed tail
    pub fn raw(&self) -> &[u8; MAX_SENSE_LENGTH] {
        &self.bytes
    }

    /// No sense data present
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Parsed key/ASC/ASCQ
    pub fn summary(&self) -> Option<SenseSummary> {
        SenseSummary::parse(self.as_slice())
    }

    /// ATA registers carried in the sense data, if any
    pub fn ata_registers(&self) -> Option<AtaResultRegisters> {
        parse_ata_status_return(self.as_slice())
    }
}

impl Default for SenseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ATA STATUS RETURN
// =============================================================================

/// Length of descriptor sense carrying one ATA Status Return descriptor
pub const ATA_STATUS_SENSE_LEN: usize = 22;

/// Encode ATA result registers as descriptor format sense data
///
/// The extended count/LBA bytes and the EXTEND bit are only filled for
/// 48-bit commands.
pub fn ata_status_return(regs: &AtaResultRegisters, extended: bool) -> SenseBuffer {
    let mut sense = [0u8; ATA_STATUS_SENSE_LEN];
    sense[0] = 0x72;
    sense[1] = if regs.is_error() {
        SenseKey::AbortedCommand as u8
    } else {
        SenseKey::RecoveredError as u8
    };
    sense[2] = asc::NO_ADDITIONAL_SENSE;
    sense[3] = ascq::ATA_PASS_THROUGH_INFO;
    sense[7] = (ATA_STATUS_SENSE_LEN - 8) as u8;

    let d = &mut sense[8..];
    d[0] = sense_descriptor::ATA_STATUS;
    d[1] = sense_descriptor::ATA_STATUS_LEN;
    d[3] = regs.error;
    d[5] = regs.count;
    d[7] = regs.lba_low;
    d[9] = regs.lba_mid;
    d[11] = regs.lba_high;
    d[12] = regs.device;
    d[13] = regs.status;
    if extended {
        d[2] = 0x01;
        d[4] = regs.count_ext;
        d[6] = regs.lba_low_ext;
        d[8] = regs.lba_mid_ext;
        d[10] = regs.lba_high_ext;
    }

    let mut buffer = SenseBuffer::new();
    buffer.set(&sense);
    buffer
}

/// Decode ATA registers from SAT sense data (descriptor or fixed format)
pub fn parse_ata_status_return(data: &[u8]) -> Option<AtaResultRegisters> {
    let summary = SenseSummary::parse(data)?;
    match summary.format {
        SenseFormat::Descriptor => {
            let (_, d) = descriptors(data).find(|(code, d)| {
                *code == sense_descriptor::ATA_STATUS && d.len() >= 14
            })?;
            let extended = d[2] & 0x01 != 0;
            let mut regs = AtaResultRegisters {
                error: d[3],
                count: d[5],
                lba_low: d[7],
                lba_mid: d[9],
                lba_high: d[11],
                device: d[12],
                status: d[13],
                ..Default::default()
            };
            if extended {
                regs.count_ext = d[4];
                regs.lba_low_ext = d[6];
                regs.lba_mid_ext = d[8];
                regs.lba_high_ext = d[10];
            }
            Some(regs)
        }
        SenseFormat::Fixed if summary.is_ata_pass_through_info() => {
            let fixed = FixedSenseData::from_bytes(data)?;
            Some(AtaResultRegisters {
                error: fixed.information[0],
                status: fixed.information[1],
                device: fixed.information[2],
                count: fixed.information[3],
                lba_low: fixed.command_info[1],
                lba_mid: fixed.command_info[2],
                lba_high: fixed.command_info[3],
                ..Default::default()
            })
        }
        SenseFormat::Fixed => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs() -> AtaResultRegisters {
        AtaResultRegisters {
            status: 0x50,
            error: 0x00,
            device: 0xE0,
            lba_low: 0x11,
            lba_mid: 0x22,
            lba_high: 0x33,
            lba_low_ext: 0x44,
            lba_mid_ext: 0x55,
            lba_high_ext: 0x66,
            count: 0x08,
            count_ext: 0x01,
        }
    }

    #[test]
    fn test_ata_status_return_layout() {
        let sense = ata_status_return(&regs(), true);
        let b = sense.as_slice();
        assert_eq!(b.len(), 22);
        assert_eq!(b[0], 0x72);
        assert_eq!(b[1], SenseKey::RecoveredError as u8);
        assert_eq!((b[2], b[3]), (0x00, 0x1D));
        assert_eq!(b[7], 14);
        assert_eq!(&b[8..10], &[0x09, 0x0C]);
        assert_eq!(b[10], 0x01);
        assert_eq!(&b[12..14], &[0x01, 0x08]);
        assert_eq!(&b[14..20], &[0x44, 0x11, 0x55, 0x22, 0x66, 0x33]);
        assert_eq!(b[20], 0xE0);
        assert_eq!(b[21], 0x50);
        assert_eq!(sense.ata_registers(), Some(regs()));
    }

    #[test]
    fn test_28bit_leaves_extended_slots_clear() {
        let sense = ata_status_return(&regs(), false);
        let b = sense.as_slice();
        assert_eq!(b[10], 0x00);
        assert_eq!((b[12], b[14], b[16], b[18]), (0, 0, 0, 0));
        let back = sense.ata_registers().unwrap();
        assert_eq!(back.lba_low_ext, 0);
        assert_eq!(back.lba_low, 0x11);
    }

    #[test]
    fn test_error_uses_aborted_command() {
        let mut r = regs();
        r.status = 0x51;
        r.error = 0x04;
        let summary = ata_status_return(&r, false).summary().unwrap();
        assert_eq!(summary.sense_key, SenseKey::AbortedCommand);
        assert!(summary.is_ata_pass_through_info());
    }

    #[test]
    fn test_invalid_opcode_detection() {
        let mut fixed = [0u8; 18];
        fixed[0] = 0x70;
        fixed[2] = 0x05;
        fixed[7] = 10;
        fixed[12] = 0x20;
        let summary = SenseSummary::parse(&fixed).unwrap();
        assert_eq!(summary.format, SenseFormat::Fixed);
        assert!(summary.is_invalid_opcode());

        fixed[12] = 0x24;
        assert!(!SenseSummary::parse(&fixed).unwrap().is_invalid_opcode());
    }

    #[test]
    fn test_sense_buffer_clear() {
        let mut buf = SenseBuffer::new();
        buf.set(&[0x72, 0x05, 0x20, 0x00, 0, 0, 0, 0]);
        assert!(!buf.is_empty());
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.raw().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unknown_response_code() {
        assert_eq!(SenseSummary::parse(&[0x00; 18]), None);
        assert_eq!(SenseSummary::parse(&[]), None);
    }
}
