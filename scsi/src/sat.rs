//! SCSI / ATA Translation pass-through CDBs
//!
//! ATA PASS-THROUGH (16) carries a full 48-bit task file. The 12-byte
//! form predates the 16-byte one and only reaches 28-bit commands; it is
//! what older translators understand when the 16-byte opcode is rejected.

use csmi_ata::{AtaCommand, AtaProtocol, TransferDirection};

use crate::cdb::{Cdb, CdbBuilder};
use crate::{opcode, ScsiError};

/// SAT protocol field values
pub mod protocol {
    /// Hard reset
    pub const HARD_RESET: u8 = 0;
    /// Software reset
    pub const SRST: u8 = 1;
    /// Non-data
    pub const NON_DATA: u8 = 3;
    /// PIO data-in
    pub const PIO_DATA_IN: u8 = 4;
    /// PIO data-out
    pub const PIO_DATA_OUT: u8 = 5;
    /// DMA
    pub const DMA: u8 = 6;
    /// DMA queued
    pub const DMA_QUEUED: u8 = 7;
    /// Execute device diagnostic
    pub const DEVICE_DIAGNOSTIC: u8 = 8;
    /// Device reset
    pub const DEVICE_RESET: u8 = 9;
    /// First-party DMA
    pub const FPDMA: u8 = 12;
}

const CK_COND: u8 = 0x20;
const T_DIR_IN: u8 = 0x08;
const BYTE_BLOCK: u8 = 0x04;
/// Transfer length is in the count field
const T_LENGTH_COUNT: u8 = 0x02;

/// Protocol field for a command
pub fn protocol_field(protocol: AtaProtocol, direction: TransferDirection) -> u8 {
    match protocol {
        AtaProtocol::NonData => protocol::NON_DATA,
        AtaProtocol::PioIn => protocol::PIO_DATA_IN,
        AtaProtocol::PioOut => protocol::PIO_DATA_OUT,
        AtaProtocol::Dma => protocol::DMA,
        AtaProtocol::DmaQueued => protocol::DMA_QUEUED,
        AtaProtocol::Fpdma => protocol::FPDMA,
        AtaProtocol::DeviceDiagnostic => protocol::DEVICE_DIAGNOSTIC,
        AtaProtocol::DeviceReset => protocol::DEVICE_RESET,
        AtaProtocol::Packet => match direction {
            TransferDirection::In => protocol::PIO_DATA_IN,
            TransferDirection::Out => protocol::PIO_DATA_OUT,
            TransferDirection::None => protocol::NON_DATA,
        },
    }
}

fn transfer_flags(cmd: &AtaCommand) -> u8 {
    if !cmd.protocol.has_data() || cmd.direction == TransferDirection::None {
        // No data phase: ask for the registers back
        return CK_COND;
    }
    let mut flags = BYTE_BLOCK | T_LENGTH_COUNT;
    if cmd.direction == TransferDirection::In {
        flags |= T_DIR_IN;
    }
    flags
}

/// Encode as ATA PASS-THROUGH (16)
pub fn ata_pass_through_16(cmd: &AtaCommand) -> Cdb {
    let tf = &cmd.task_file;
    let mut cdb = CdbBuilder::raw(16);
    let b = cdb.as_mut_slice();
    b[0] = opcode::ATA_PASS_THROUGH_16;
    b[1] = protocol_field(cmd.protocol, cmd.direction) << 1;
    b[2] = transfer_flags(cmd);
    b[4] = tf.features as u8;
    b[6] = tf.count as u8;
    b[8] = tf.lba as u8;
    b[10] = (tf.lba >> 8) as u8;
    b[12] = (tf.lba >> 16) as u8;
    b[14] = tf.command;
    b[15] = tf.control;
    if cmd.extended {
        b[1] |= 0x01;
        b[3] = (tf.features >> 8) as u8;
        b[5] = (tf.count >> 8) as u8;
        b[7] = (tf.lba >> 24) as u8;
        b[9] = (tf.lba >> 32) as u8;
        b[11] = (tf.lba >> 40) as u8;
        b[13] = tf.device;
    } else {
        b[13] = (tf.device & 0xF0) | ((tf.lba >> 24) as u8 & 0x0F);
    }
    cdb
}

/// Encode as ATA PASS-THROUGH (12); 28-bit commands only
pub fn ata_pass_through_12(cmd: &AtaCommand) -> Result<Cdb, ScsiError> {
    if cmd.extended {
        return Err(ScsiError::NeedsExtendedCdb {
            command: cmd.task_file.command,
        });
    }
    let tf = &cmd.task_file;
    let mut cdb = CdbBuilder::raw(12);
    let b = cdb.as_mut_slice();
    b[0] = opcode::ATA_PASS_THROUGH_12;
    b[1] = protocol_field(cmd.protocol, cmd.direction) << 1;
    b[2] = transfer_flags(cmd);
    b[3] = tf.features as u8;
    b[4] = tf.count as u8;
    b[5] = tf.lba as u8;
    b[6] = (tf.lba >> 8) as u8;
    b[7] = (tf.lba >> 16) as u8;
    b[8] = (tf.device & 0xF0) | ((tf.lba >> 24) as u8 & 0x0F);
    b[9] = tf.command;
    b[11] = tf.control;
    Ok(cdb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_pt16() {
        let cdb = ata_pass_through_16(&AtaCommand::identify());
        let b = cdb.as_slice();
        assert_eq!(b.len(), 16);
        assert_eq!(b[0], 0x85);
        assert_eq!(b[1], protocol::PIO_DATA_IN << 1);
        assert_eq!(b[2], T_DIR_IN | BYTE_BLOCK | T_LENGTH_COUNT);
        assert_eq!(b[6], 1);
        assert_eq!(b[14], 0xEC);
    }

    #[test]
    fn test_extended_lba_interleave() {
        let cdb = ata_pass_through_16(&AtaCommand::read_dma_ext(0x0000_A1B2_C3D4_E5F6, 0x0102));
        let b = cdb.as_slice();
        assert_eq!(b[1] & 0x01, 0x01);
        assert_eq!((b[5], b[6]), (0x01, 0x02));
        assert_eq!((b[7], b[8]), (0xC3, 0xF6));
        assert_eq!((b[9], b[10]), (0xB2, 0xE5));
        assert_eq!((b[11], b[12]), (0xA1, 0xD4));
    }

    #[test]
    fn test_non_data_requests_registers() {
        let cdb = ata_pass_through_16(&AtaCommand::check_power_mode());
        assert_eq!(cdb.as_slice()[1], protocol::NON_DATA << 1);
        assert_eq!(cdb.as_slice()[2], CK_COND);
    }

    #[test]
    fn test_pt12_rejects_48bit() {
        assert_eq!(
            ata_pass_through_12(&AtaCommand::read_dma_ext(0, 1)),
            Err(ScsiError::NeedsExtendedCdb { command: 0x25 })
        );
        let cdb = ata_pass_through_12(&AtaCommand::identify()).unwrap();
        assert_eq!(cdb.len(), 12);
        assert_eq!(cdb.as_slice()[0], 0xA1);
        assert_eq!(cdb.as_slice()[9], 0xEC);
    }
}
