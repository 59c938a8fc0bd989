//! ATA commands
//!
//! Task file contents plus the protocol class that decides how a command
//! is carried (STP flags, SAT protocol field).

use crate::fis::H2dFis;

/// ATA command opcodes
pub mod opcode {
    /// Device reset
    pub const DEVICE_RESET: u8 = 0x08;
    /// Read sectors (PIO, 28-bit)
    pub const READ_SECTORS: u8 = 0x20;
    /// Read sectors ext (PIO, 48-bit)
    pub const READ_SECTORS_EXT: u8 = 0x24;
    /// Read DMA ext
    pub const READ_DMA_EXT: u8 = 0x25;
    /// Read log ext
    pub const READ_LOG_EXT: u8 = 0x2F;
    /// Write sectors (PIO, 28-bit)
    pub const WRITE_SECTORS: u8 = 0x30;
    /// Write sectors ext (PIO, 48-bit)
    pub const WRITE_SECTORS_EXT: u8 = 0x34;
    /// Write DMA ext
    pub const WRITE_DMA_EXT: u8 = 0x35;
    /// Read verify sectors
    pub const READ_VERIFY_SECTORS: u8 = 0x40;
    /// Read FPDMA queued
    pub const READ_FPDMA_QUEUED: u8 = 0x60;
    /// Write FPDMA queued
    pub const WRITE_FPDMA_QUEUED: u8 = 0x61;
    /// Execute device diagnostic
    pub const EXECUTE_DEVICE_DIAGNOSTIC: u8 = 0x90;
    /// Download microcode
    pub const DOWNLOAD_MICROCODE: u8 = 0x92;
    /// Packet
    pub const PACKET: u8 = 0xA0;
    /// Identify packet device
    pub const IDENTIFY_PACKET_DEVICE: u8 = 0xA1;
    /// SMART
    pub const SMART: u8 = 0xB0;
    /// Read DMA (28-bit)
    pub const READ_DMA: u8 = 0xC8;
    /// Write DMA (28-bit)
    pub const WRITE_DMA: u8 = 0xCA;
    /// Check power mode
    pub const CHECK_POWER_MODE: u8 = 0xE5;
    /// Flush cache
    pub const FLUSH_CACHE: u8 = 0xE7;
    /// Flush cache ext
    pub const FLUSH_CACHE_EXT: u8 = 0xEA;
    /// Identify device
    pub const IDENTIFY_DEVICE: u8 = 0xEC;
    /// Set features
    pub const SET_FEATURES: u8 = 0xEF;
}

/// Device register LBA mode bit
pub const DEVICE_LBA: u8 = 0x40;

/// Protocol class of an ATA command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaProtocol {
    /// No data phase
    NonData,
    /// PIO data-in
    PioIn,
    /// PIO data-out
    PioOut,
    /// DMA
    Dma,
    /// Legacy queued DMA
    DmaQueued,
    /// First-party DMA (NCQ)
    Fpdma,
    /// Packet (ATAPI)
    Packet,
    /// Execute device diagnostic
    DeviceDiagnostic,
    /// Device reset
    DeviceReset,
}

impl AtaProtocol {
    /// Protocol moves data
    pub const fn has_data(&self) -> bool {
        !matches!(
            self,
            AtaProtocol::NonData | AtaProtocol::DeviceDiagnostic | AtaProtocol::DeviceReset
        )
    }
}

/// Direction of the data phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferDirection {
    /// No data
    #[default]
    None,
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// ATA task file inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFile {
    /// Command opcode
    pub command: u8,
    /// Features (15:0)
    pub features: u16,
    /// Count (15:0)
    pub count: u16,
    /// LBA (47:0)
    pub lba: u64,
    /// Device register
    pub device: u8,
    /// ICC
    pub icc: u8,
    /// Device control
    pub control: u8,
    /// Auxiliary
    pub auxiliary: u32,
}

/// A complete ATA command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaCommand {
    /// Task file
    pub task_file: TaskFile,
    /// Protocol class
    pub protocol: AtaProtocol,
    /// Data direction
    pub direction: TransferDirection,
    /// 48-bit addressing in use
    pub extended: bool,
    /// Port multiplier port
    pub pm_port: u8,
}

impl AtaCommand {
    /// Create a command
    pub fn new(command: u8, protocol: AtaProtocol, direction: TransferDirection) -> Self {
        Self {
            task_file: TaskFile {
                command,
                device: DEVICE_LBA,
                ..Default::default()
            },
            protocol,
            direction,
            extended: false,
            pm_port: 0,
        }
    }

    /// IDENTIFY DEVICE (one 512-byte PIO-in block)
    pub fn identify() -> Self {
        let mut cmd = Self::new(
            opcode::IDENTIFY_DEVICE,
            AtaProtocol::PioIn,
            TransferDirection::In,
        );
        cmd.task_file.count = 1;
        cmd.task_file.device = 0;
        cmd
    }

    /// IDENTIFY PACKET DEVICE
    pub fn identify_packet() -> Self {
        let mut cmd = Self::identify();
        cmd.task_file.command = opcode::IDENTIFY_PACKET_DEVICE;
        cmd
    }

    /// CHECK POWER MODE
    pub fn check_power_mode() -> Self {
        Self::new(
            opcode::CHECK_POWER_MODE,
            AtaProtocol::NonData,
            TransferDirection::None,
        )
    }

    /// READ DMA EXT
    pub fn read_dma_ext(lba: u64, blocks: u16) -> Self {
        let mut cmd = Self::new(opcode::READ_DMA_EXT, AtaProtocol::Dma, TransferDirection::In);
        cmd.task_file.lba = lba;
        cmd.task_file.count = blocks;
        cmd.extended = true;
        cmd
    }

    /// WRITE DMA EXT
    pub fn write_dma_ext(lba: u64, blocks: u16) -> Self {
        let mut cmd = Self::new(opcode::WRITE_DMA_EXT, AtaProtocol::Dma, TransferDirection::Out);
        cmd.task_file.lba = lba;
        cmd.task_file.count = blocks;
        cmd.extended = true;
        cmd
    }

    /// Builder: mark as 48-bit
    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Encode as a Host-to-Device frame
    ///
    /// Without 48-bit addressing only LBA 27:0 is sent and LBA 27:24 is
    /// folded into device bits 3:0.
    pub fn to_h2d(&self) -> H2dFis {
        let tf = &self.task_file;
        let mut fis = H2dFis::new();
        fis.set_pm_port(self.pm_port);
        fis.set_command(tf.command);
        fis.set_icc(tf.icc);
        fis.set_control(tf.control);
        fis.set_auxiliary(tf.auxiliary);
        if self.extended {
            fis.set_features(tf.features);
            fis.set_count(tf.count);
            fis.set_lba(tf.lba & 0xFFFF_FFFF_FFFF);
            fis.set_device(tf.device);
        } else {
            fis.set_features(tf.features & 0xFF);
            fis.set_count(tf.count & 0xFF);
            fis.set_lba(tf.lba & 0x00FF_FFFF);
            fis.set_device((tf.device & 0xF0) | ((tf.lba >> 24) as u8 & 0x0F));
        }
        fis
    }
}
