//! IDENTIFY DEVICE data

use crate::{check_len, FisResult};

/// IDENTIFY DEVICE block length
pub const IDENTIFY_LEN: usize = 512;

/// Parsed IDENTIFY DEVICE data (512 bytes, 256 little-endian words)
#[derive(Clone)]
pub struct IdentifyData([u8; IDENTIFY_LEN]);

impl IdentifyData {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        check_len(data, IDENTIFY_LEN)?;
        let mut bytes = [0u8; IDENTIFY_LEN];
        bytes.copy_from_slice(&data[..IDENTIFY_LEN]);
        Ok(Self(bytes))
    }

    /// Word at index
    pub fn word(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.0[index * 2], self.0[index * 2 + 1]])
    }

    // ATA strings store two characters per word, high byte first.
    fn ata_string(&self, first_word: usize, last_word: usize) -> String {
        let mut out = String::with_capacity((last_word - first_word + 1) * 2);
        for w in first_word..=last_word {
            let [lo, hi] = self.word(w).to_le_bytes();
            for c in [hi, lo] {
                if c.is_ascii_graphic() || c == b' ' {
                    out.push(c as char);
                }
            }
        }
        out.trim().to_string()
    }

    /// Serial number (words 10-19)
    pub fn serial_number(&self) -> String {
        self.ata_string(10, 19)
    }

    /// Firmware revision (words 23-26)
    pub fn firmware_revision(&self) -> String {
        self.ata_string(23, 26)
    }

    /// Model number (words 27-46)
    pub fn model_number(&self) -> String {
        self.ata_string(27, 46)
    }

    /// ATAPI device (word 0 bit 15)
    pub fn is_packet_device(&self) -> bool {
        self.word(0) & 0x8000 != 0
    }

    /// 48-bit address feature set supported (word 83 bit 10)
    pub fn supports_lba48(&self) -> bool {
        self.word(83) & 0x0400 != 0
    }

    /// Addressable sectors
    pub fn max_lba(&self) -> u64 {
        if self.supports_lba48() {
            (self.word(100) as u64)
                | (self.word(101) as u64) << 16
                | (self.word(102) as u64) << 32
                | (self.word(103) as u64) << 48
        } else {
            (self.word(60) as u64) | (self.word(61) as u64) << 16
        }
    }
}

impl core::fmt::Debug for IdentifyData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentifyData")
            .field("model", &self.model_number())
            .field("serial", &self.serial_number())
            .field("firmware", &self.firmware_revision())
            .finish()
    }
}

/// Write an ATA string into an identify block
pub fn encode_ata_string(block: &mut [u8], first_word: usize, words: usize, text: &str) {
    let mut padded = vec![b' '; words * 2];
    for (dst, src) in padded.iter_mut().zip(text.bytes()) {
        *dst = src;
    }
    for (i, pair) in padded.chunks(2).enumerate() {
        let off = (first_word + i) * 2;
        block[off] = pair[1];
        block[off + 1] = pair[0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> [u8; IDENTIFY_LEN] {
        let mut block = [0u8; IDENTIFY_LEN];
        encode_ata_string(&mut block, 10, 10, "S3Z9NB0K123456");
        encode_ata_string(&mut block, 23, 4, "RVT02B6Q");
        encode_ata_string(&mut block, 27, 20, "Samsung SSD 860 EVO 500GB");
        block[83 * 2 + 1] = 0x04;
        block[100 * 2..100 * 2 + 8].copy_from_slice(&0x3A38_6030u64.to_le_bytes());
        block
    }

    #[test]
    fn test_strings_are_byte_swapped() {
        let block = sample();
        assert_eq!(&block[20..22], b"3S");
        let id = IdentifyData::from_bytes(&block).unwrap();
        assert_eq!(id.serial_number(), "S3Z9NB0K123456");
        assert_eq!(id.firmware_revision(), "RVT02B6Q");
        assert_eq!(id.model_number(), "Samsung SSD 860 EVO 500GB");
    }

    #[test]
    fn test_capacity() {
        let id = IdentifyData::from_bytes(&sample()).unwrap();
        assert!(id.supports_lba48());
        assert_eq!(id.max_lba(), 0x3A38_6030);
        assert!(!id.is_packet_device());
    }

    #[test]
    fn test_short_block() {
        assert!(IdentifyData::from_bytes(&[0u8; 100]).is_err());
    }
}
