//! ATA result registers
//!
//! The normalized register set a command completes with, independent of
//! which frame carried it back.

use bitflags::bitflags;

use crate::fis::{D2hFis, PioSetupFis};

bitflags! {
    /// ATA status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AtaStatus: u8 {
        /// Error
        const ERR = 0x01;
        /// Sense data available
        const SENSE = 0x02;
        /// Alignment error
        const ALIGN = 0x04;
        /// Data request
        const DRQ = 0x08;
        /// Deferred write error
        const DEFERRED = 0x10;
        /// Device fault
        const DF = 0x20;
        /// Device ready
        const DRDY = 0x40;
        /// Busy
        const BSY = 0x80;
    }
}

bitflags! {
    /// ATA error register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AtaError: u8 {
        /// Command completion time out / media error
        const CCTO = 0x01;
        /// End of media
        const EOM = 0x02;
        /// Command aborted
        const ABRT = 0x04;
        /// ID not found
        const IDNF = 0x10;
        /// Uncorrectable data
        const UNC = 0x40;
        /// Interface CRC error
        const ICRC = 0x80;
    }
}

/// Register set returned by a completed ATA command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtaResultRegisters {
    /// Status
    pub status: u8,
    /// Error
    pub error: u8,
    /// Device
    pub device: u8,
    /// LBA 7:0
    pub lba_low: u8,
    /// LBA 15:8
    pub lba_mid: u8,
    /// LBA 23:16
    pub lba_high: u8,
    /// LBA 31:24
    pub lba_low_ext: u8,
    /// LBA 39:32
    pub lba_mid_ext: u8,
    /// LBA 47:40
    pub lba_high_ext: u8,
    /// Count 7:0
    pub count: u8,
    /// Count 15:8
    pub count_ext: u8,
}

impl AtaResultRegisters {
    fn from_parts(status: u8, error: u8, device: u8, lba: u64, count: u16) -> Self {
        Self {
            status,
            error,
            device,
            lba_low: lba as u8,
            lba_mid: (lba >> 8) as u8,
            lba_high: (lba >> 16) as u8,
            lba_low_ext: (lba >> 24) as u8,
            lba_mid_ext: (lba >> 32) as u8,
            lba_high_ext: (lba >> 40) as u8,
            count: count as u8,
            count_ext: (count >> 8) as u8,
        }
    }

    /// 48-bit LBA
    pub fn lba(&self) -> u64 {
        (self.lba_low as u64)
            | (self.lba_mid as u64) << 8
            | (self.lba_high as u64) << 16
            | (self.lba_low_ext as u64) << 24
            | (self.lba_mid_ext as u64) << 32
            | (self.lba_high_ext as u64) << 40
    }

    /// 16-bit count
    pub fn sector_count(&self) -> u16 {
        u16::from_le_bytes([self.count, self.count_ext])
    }

    /// Status as flags
    pub fn status_flags(&self) -> AtaStatus {
        AtaStatus::from_bits_retain(self.status)
    }

    /// Error as flags
    pub fn error_flags(&self) -> AtaError {
        AtaError::from_bits_retain(self.error)
    }

    /// Command failed (ERR or DF set)
    pub fn is_error(&self) -> bool {
        self.status_flags().intersects(AtaStatus::ERR | AtaStatus::DF)
    }
}

impl From<&D2hFis> for AtaResultRegisters {
    fn from(fis: &D2hFis) -> Self {
        Self::from_parts(fis.status(), fis.error(), fis.device(), fis.lba(), fis.count())
    }
}

impl From<&PioSetupFis> for AtaResultRegisters {
    fn from(fis: &PioSetupFis) -> Self {
        Self::from_parts(fis.e_status(), fis.error(), fis.device(), fis.lba(), fis.count())
    }
}
