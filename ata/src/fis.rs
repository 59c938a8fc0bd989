//! SATA Frame Information Structures
//!
//! Byte layouts follow SATA 3.x section 10.5. Multi-byte register fields
//! are split across non-contiguous bytes, so each accessor names its
//! offsets explicitly.

use static_assertions::const_assert_eq;

use crate::registers::AtaResultRegisters;
use crate::{check_len, FisError, FisResult};

// =============================================================================
// FIS CONSTANTS
// =============================================================================

/// Length of the register frames (H2D, D2H, PIO Setup)
pub const REGISTER_FIS_LEN: usize = 20;

/// Set Device Bits frame length
pub const SET_DEVICE_BITS_FIS_LEN: usize = 8;

/// DMA Activate frame length
pub const DMA_ACTIVATE_FIS_LEN: usize = 4;

/// DMA Setup frame length
pub const DMA_SETUP_FIS_LEN: usize = 28;

/// BIST Activate frame length
pub const BIST_FIS_LEN: usize = 12;

/// Smallest Data FIS (header dword only)
pub const DATA_FIS_MIN_LEN: usize = 4;

/// Largest Data FIS (header plus 2048 payload dwords)
pub const DATA_FIS_MAX_LEN: usize = 8196;

/// C bit in byte 1 of a Host-to-Device frame
const H2D_COMMAND_BIT: u8 = 0x80;
/// I bit in byte 1 of device-originated frames
const INTERRUPT_BIT: u8 = 0x40;
/// D bit in byte 1 of PIO Setup and DMA Setup
const DIRECTION_BIT: u8 = 0x20;
/// Port multiplier field in byte 1
const PM_PORT_MASK: u8 = 0x0F;

/// FIS type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FisType {
    /// Register, Host to Device
    RegisterH2d = 0x27,
    /// Register, Device to Host
    RegisterD2h = 0x34,
    /// DMA Activate
    DmaActivate = 0x39,
    /// DMA Setup
    DmaSetup = 0x41,
    /// Data
    Data = 0x46,
    /// BIST Activate
    Bist = 0x58,
    /// PIO Setup
    PioSetup = 0x5F,
    /// Set Device Bits
    SetDeviceBits = 0xA1,
}

impl FisType {
    /// Create from type byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x27 => Some(FisType::RegisterH2d),
            0x34 => Some(FisType::RegisterD2h),
            0x39 => Some(FisType::DmaActivate),
            0x41 => Some(FisType::DmaSetup),
            0x46 => Some(FisType::Data),
            0x58 => Some(FisType::Bist),
            0x5F => Some(FisType::PioSetup),
            0xA1 => Some(FisType::SetDeviceBits),
            _ => None,
        }
    }

    /// Fixed frame length, `None` for the variable-length Data FIS
    pub const fn frame_len(&self) -> Option<usize> {
        match self {
            FisType::RegisterH2d | FisType::RegisterD2h | FisType::PioSetup => {
                Some(REGISTER_FIS_LEN)
            }
            FisType::SetDeviceBits => Some(SET_DEVICE_BITS_FIS_LEN),
            FisType::DmaActivate => Some(DMA_ACTIVATE_FIS_LEN),
            FisType::DmaSetup => Some(DMA_SETUP_FIS_LEN),
            FisType::Bist => Some(BIST_FIS_LEN),
            FisType::Data => None,
        }
    }
}

// =============================================================================
// SHARED REGISTER ACCESSORS
// =============================================================================

// LBA bytes live at 4,5,6 (bits 0..24) and 8,9,10 (bits 24..48) in every
// register frame.
fn read_lba(bytes: &[u8]) -> u64 {
    (bytes[4] as u64)
        | (bytes[5] as u64) << 8
        | (bytes[6] as u64) << 16
        | (bytes[8] as u64) << 24
        | (bytes[9] as u64) << 32
        | (bytes[10] as u64) << 40
}

fn write_lba(bytes: &mut [u8], lba: u64) {
    bytes[4] = lba as u8;
    bytes[5] = (lba >> 8) as u8;
    bytes[6] = (lba >> 16) as u8;
    bytes[8] = (lba >> 24) as u8;
    bytes[9] = (lba >> 32) as u8;
    bytes[10] = (lba >> 40) as u8;
}

fn read_count(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[12], bytes[13]])
}

fn expect_type(data: &[u8], ty: FisType) -> FisResult<()> {
    let len = ty.frame_len().unwrap_or(DATA_FIS_MIN_LEN);
    check_len(data, len)?;
    if data[0] != ty as u8 {
        return Err(FisError::UnexpectedType(data[0]));
    }
    Ok(())
}

fn frame<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&data[..N]);
    bytes
}

// =============================================================================
// REGISTER HOST TO DEVICE
// =============================================================================

/// Register Host-to-Device FIS (20 bytes)
///
/// | Byte | Field                          |
/// |------|--------------------------------|
/// | 0    | type 27h                       |
/// | 1    | C (bit 7), PM port (bits 3:0)  |
/// | 2    | command                        |
/// | 3    | features 7:0                   |
/// | 4-6  | LBA 23:0                       |
/// | 7    | device                         |
/// | 8-10 | LBA 47:24                      |
/// | 11   | features 15:8                  |
/// | 12   | count 7:0                      |
/// | 13   | count 15:8                     |
/// | 14   | ICC                            |
/// | 15   | control                        |
/// | 16-19| auxiliary                      |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct H2dFis([u8; REGISTER_FIS_LEN]);

impl H2dFis {
    /// Create a command frame (C bit set)
    pub fn new() -> Self {
        let mut bytes = [0u8; REGISTER_FIS_LEN];
        bytes[0] = FisType::RegisterH2d as u8;
        bytes[1] = H2D_COMMAND_BIT;
        Self(bytes)
    }

    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::RegisterH2d)?;
        Ok(Self(frame(data)))
    }

    /// Raw frame bytes
    pub const fn as_bytes(&self) -> &[u8; REGISTER_FIS_LEN] {
        &self.0
    }

    /// Command register update bit
    pub const fn is_command(&self) -> bool {
        (self.0[1] & H2D_COMMAND_BIT) != 0
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Set the port multiplier port
    pub fn set_pm_port(&mut self, port: u8) {
        self.0[1] = (self.0[1] & !PM_PORT_MASK) | (port & PM_PORT_MASK);
    }

    /// Command opcode
    pub const fn command(&self) -> u8 {
        self.0[2]
    }

    /// Set the command opcode
    pub fn set_command(&mut self, command: u8) {
        self.0[2] = command;
    }

    /// Features (15:0)
    pub const fn features(&self) -> u16 {
        (self.0[3] as u16) | (self.0[11] as u16) << 8
    }

    /// Set features (15:0)
    pub fn set_features(&mut self, features: u16) {
        self.0[3] = features as u8;
        self.0[11] = (features >> 8) as u8;
    }

    /// LBA (47:0)
    pub fn lba(&self) -> u64 {
        read_lba(&self.0)
    }

    /// Set LBA (47:0)
    pub fn set_lba(&mut self, lba: u64) {
        write_lba(&mut self.0, lba);
    }

    /// Device register
    pub const fn device(&self) -> u8 {
        self.0[7]
    }

    /// Set the device register
    pub fn set_device(&mut self, device: u8) {
        self.0[7] = device;
    }

    /// Count (15:0)
    pub fn count(&self) -> u16 {
        read_count(&self.0)
    }

    /// Set count (15:0)
    pub fn set_count(&mut self, count: u16) {
        self.0[12] = count as u8;
        self.0[13] = (count >> 8) as u8;
    }

    /// Isochronous command completion
    pub const fn icc(&self) -> u8 {
        self.0[14]
    }

    /// Set ICC
    pub fn set_icc(&mut self, icc: u8) {
        self.0[14] = icc;
    }

    /// Device control register
    pub const fn control(&self) -> u8 {
        self.0[15]
    }

    /// Set the device control register
    pub fn set_control(&mut self, control: u8) {
        self.0[15] = control;
    }

    /// Auxiliary field
    pub fn auxiliary(&self) -> u32 {
        u32::from_le_bytes([self.0[16], self.0[17], self.0[18], self.0[19]])
    }

    /// Set the auxiliary field
    pub fn set_auxiliary(&mut self, aux: u32) {
        self.0[16..20].copy_from_slice(&aux.to_le_bytes());
    }
}

impl Default for H2dFis {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// REGISTER DEVICE TO HOST
// =============================================================================

/// Register Device-to-Host FIS (20 bytes)
///
/// Status at byte 2, error at byte 3; LBA, device and count share the
/// Host-to-Device offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct D2hFis([u8; REGISTER_FIS_LEN]);

impl D2hFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::RegisterD2h)?;
        Ok(Self(frame(data)))
    }

    /// Raw frame bytes
    pub const fn as_bytes(&self) -> &[u8; REGISTER_FIS_LEN] {
        &self.0
    }

    /// Interrupt bit
    pub const fn interrupt(&self) -> bool {
        (self.0[1] & INTERRUPT_BIT) != 0
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Status register
    pub const fn status(&self) -> u8 {
        self.0[2]
    }

    /// Error register
    pub const fn error(&self) -> u8 {
        self.0[3]
    }

    /// LBA (47:0)
    pub fn lba(&self) -> u64 {
        read_lba(&self.0)
    }

    /// Device register
    pub const fn device(&self) -> u8 {
        self.0[7]
    }

    /// Count (15:0)
    pub fn count(&self) -> u16 {
        read_count(&self.0)
    }
}

// =============================================================================
// PIO SETUP
// =============================================================================

/// PIO Setup FIS (20 bytes)
///
/// Byte 2 carries the initial status; the status the device ends the
/// transfer with is E_Status at byte 15. Transfer count is bytes 16-17.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PioSetupFis([u8; REGISTER_FIS_LEN]);

impl PioSetupFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::PioSetup)?;
        Ok(Self(frame(data)))
    }

    /// Raw frame bytes
    pub const fn as_bytes(&self) -> &[u8; REGISTER_FIS_LEN] {
        &self.0
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Transfer direction is device to host
    pub const fn is_device_to_host(&self) -> bool {
        (self.0[1] & DIRECTION_BIT) != 0
    }

    /// Interrupt bit
    pub const fn interrupt(&self) -> bool {
        (self.0[1] & INTERRUPT_BIT) != 0
    }

    /// Initial status
    pub const fn status(&self) -> u8 {
        self.0[2]
    }

    /// Error register
    pub const fn error(&self) -> u8 {
        self.0[3]
    }

    /// LBA (47:0)
    pub fn lba(&self) -> u64 {
        read_lba(&self.0)
    }

    /// Device register
    pub const fn device(&self) -> u8 {
        self.0[7]
    }

    /// Count (15:0)
    pub fn count(&self) -> u16 {
        read_count(&self.0)
    }

    /// Ending status
    pub const fn e_status(&self) -> u8 {
        self.0[15]
    }

    /// Bytes to transfer in the following Data FIS
    pub fn transfer_count(&self) -> u16 {
        u16::from_le_bytes([self.0[16], self.0[17]])
    }
}

// =============================================================================
// SET DEVICE BITS
// =============================================================================

/// Set Device Bits FIS (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SetDeviceBitsFis([u8; SET_DEVICE_BITS_FIS_LEN]);

impl SetDeviceBitsFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::SetDeviceBits)?;
        Ok(Self(frame(data)))
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Interrupt bit
    pub const fn interrupt(&self) -> bool {
        (self.0[1] & INTERRUPT_BIT) != 0
    }

    /// Notification bit
    pub const fn notification(&self) -> bool {
        (self.0[1] & 0x80) != 0
    }

    /// Status bits 6:4 and 2:0; bits 7 and 3 are reserved in this frame
    pub const fn status(&self) -> u8 {
        self.0[2] & 0x77
    }

    /// Error register
    pub const fn error(&self) -> u8 {
        self.0[3]
    }

    /// SActive completion bits
    pub fn sactive(&self) -> u32 {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }
}

// =============================================================================
// DMA ACTIVATE / DMA SETUP / BIST
// =============================================================================

/// DMA Activate FIS (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct DmaActivateFis([u8; DMA_ACTIVATE_FIS_LEN]);

impl DmaActivateFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::DmaActivate)?;
        Ok(Self(frame(data)))
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }
}

/// DMA Setup FIS (28 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct DmaSetupFis([u8; DMA_SETUP_FIS_LEN]);

impl DmaSetupFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::DmaSetup)?;
        Ok(Self(frame(data)))
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Transfer direction is device to host
    pub const fn is_device_to_host(&self) -> bool {
        (self.0[1] & DIRECTION_BIT) != 0
    }

    /// Interrupt bit
    pub const fn interrupt(&self) -> bool {
        (self.0[1] & INTERRUPT_BIT) != 0
    }

    /// Auto-activate bit
    pub const fn auto_activate(&self) -> bool {
        (self.0[1] & 0x80) != 0
    }

    /// DMA buffer identifier (bytes 4-11)
    pub fn buffer_id(&self) -> u64 {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[4..12]);
        u64::from_le_bytes(id)
    }

    /// Byte offset into the buffer (bytes 16-19)
    pub fn buffer_offset(&self) -> u32 {
        u32::from_le_bytes([self.0[16], self.0[17], self.0[18], self.0[19]])
    }

    /// Transfer count (bytes 20-23)
    pub fn transfer_count(&self) -> u32 {
        u32::from_le_bytes([self.0[20], self.0[21], self.0[22], self.0[23]])
    }
}

/// BIST Activate FIS (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct BistFis([u8; BIST_FIS_LEN]);

impl BistFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        expect_type(data, FisType::Bist)?;
        Ok(Self(frame(data)))
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Pattern definition bits
    pub const fn pattern(&self) -> u8 {
        self.0[2]
    }

    /// First data dword
    pub fn data_high(&self) -> u32 {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }

    /// Second data dword
    pub fn data_low(&self) -> u32 {
        u32::from_le_bytes([self.0[8], self.0[9], self.0[10], self.0[11]])
    }
}

// =============================================================================
// DATA
// =============================================================================

/// Data FIS (4..=8196 bytes, dword multiple)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFis(Vec<u8>);

impl DataFis {
    /// Create from byte slice
    pub fn from_bytes(data: &[u8]) -> FisResult<Self> {
        if data.len() < DATA_FIS_MIN_LEN || data.len() > DATA_FIS_MAX_LEN || data.len() % 4 != 0 {
            return Err(FisError::BadDataLength(data.len()));
        }
        if data[0] != FisType::Data as u8 {
            return Err(FisError::UnexpectedType(data[0]));
        }
        Ok(Self(data.to_vec()))
    }

    /// Port multiplier port
    pub fn pm_port(&self) -> u8 {
        self.0[1] & PM_PORT_MASK
    }

    /// Payload after the header dword
    pub fn payload(&self) -> &[u8] {
        &self.0[DATA_FIS_MIN_LEN..]
    }
}

// =============================================================================
// STATUS FRAMES
// =============================================================================

/// Frame returned as the completion of an STP command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFis {
    /// Register Device-to-Host
    D2h(D2hFis),
    /// PIO Setup
    PioSetup(PioSetupFis),
}

impl StatusFis {
    /// Select the layout from the type byte
    pub fn parse(data: &[u8]) -> FisResult<Self> {
        check_len(data, REGISTER_FIS_LEN)?;
        match FisType::from_byte(data[0]) {
            Some(FisType::RegisterD2h) => Ok(StatusFis::D2h(D2hFis::from_bytes(data)?)),
            Some(FisType::PioSetup) => Ok(StatusFis::PioSetup(PioSetupFis::from_bytes(data)?)),
            _ => Err(FisError::UnexpectedType(data[0])),
        }
    }

    /// Extract the result register set
    pub fn registers(&self) -> AtaResultRegisters {
        match self {
            StatusFis::D2h(fis) => AtaResultRegisters::from(fis),
            StatusFis::PioSetup(fis) => AtaResultRegisters::from(fis),
        }
    }

    /// Port multiplier port
    pub const fn pm_port(&self) -> u8 {
        match self {
            StatusFis::D2h(fis) => fis.pm_port(),
            StatusFis::PioSetup(fis) => fis.pm_port(),
        }
    }
}

const_assert_eq!(core::mem::size_of::<H2dFis>(), REGISTER_FIS_LEN);
const_assert_eq!(core::mem::size_of::<D2hFis>(), REGISTER_FIS_LEN);
const_assert_eq!(core::mem::size_of::<PioSetupFis>(), REGISTER_FIS_LEN);
const_assert_eq!(core::mem::size_of::<DmaSetupFis>(), DMA_SETUP_FIS_LEN);
const_assert_eq!(DATA_FIS_MAX_LEN % 4, 0);

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_register_frame(ty: u8) -> [u8; REGISTER_FIS_LEN] {
        let mut bytes = [0u8; REGISTER_FIS_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = 0x10 + i as u8;
        }
        bytes[0] = ty;
        bytes
    }

    #[test]
    fn test_h2d_layout() {
        let mut fis = H2dFis::new();
        fis.set_command(0x25);
        fis.set_features(0xABCD);
        fis.set_lba(0x0000_1234_5678_9ABC);
        fis.set_device(0x40);
        fis.set_count(0x0102);
        fis.set_pm_port(0x3);
        fis.set_control(0x08);

        let b = fis.as_bytes();
        assert_eq!(b[0], 0x27);
        assert_eq!(b[1], 0x83);
        assert_eq!(b[2], 0x25);
        assert_eq!(b[3], 0xCD);
        assert_eq!(b[11], 0xAB);
        assert_eq!(&b[4..7], &[0xBC, 0x9A, 0x78]);
        assert_eq!(b[7], 0x40);
        assert_eq!(&b[8..11], &[0x56, 0x34, 0x12]);
        assert_eq!(&b[12..14], &[0x02, 0x01]);
        assert_eq!(b[15], 0x08);

        let back = H2dFis::from_bytes(b).unwrap();
        assert!(back.is_command());
        assert_eq!(back.pm_port(), 3);
        assert_eq!(back.lba(), 0x1234_5678_9ABC);
        assert_eq!(back.features(), 0xABCD);
    }

    #[test]
    fn test_d2h_offsets() {
        let fis = D2hFis::from_bytes(&sample_register_frame(0x34)).unwrap();
        assert_eq!(fis.status(), 0x12);
        assert_eq!(fis.error(), 0x13);
        assert_eq!(fis.device(), 0x17);
        assert_eq!(fis.lba(), 0x1A19_1816_1514);
        assert_eq!(fis.count(), 0x1D1C);
    }

    #[test]
    fn test_pio_setup_ending_status() {
        let fis = PioSetupFis::from_bytes(&sample_register_frame(0x5F)).unwrap();
        assert_eq!(fis.status(), 0x12);
        assert_eq!(fis.e_status(), 0x1F);
        assert_eq!(fis.transfer_count(), 0x2120);
    }

    #[test]
    fn test_status_fis_dispatch() {
        let d2h = StatusFis::parse(&sample_register_frame(0x34)).unwrap();
        assert!(matches!(d2h, StatusFis::D2h(_)));
        assert_eq!(d2h.registers().status, 0x12);

        let pio = StatusFis::parse(&sample_register_frame(0x5F)).unwrap();
        assert!(matches!(pio, StatusFis::PioSetup(_)));
        assert_eq!(pio.registers().status, 0x1F);

        assert_eq!(
            StatusFis::parse(&sample_register_frame(0x27)),
            Err(FisError::UnexpectedType(0x27))
        );
    }

    #[test]
    fn test_short_frame_rejected() {
        assert_eq!(
            D2hFis::from_bytes(&[0x34, 0, 0]),
            Err(FisError::TooShort { needed: 20, got: 3 })
        );
    }

    #[test]
    fn test_set_device_bits_status_mask() {
        let sdb = SetDeviceBitsFis::from_bytes(&[0xA1, 0x40, 0xFF, 0x04, 1, 0, 0, 0]).unwrap();
        assert!(sdb.interrupt());
        assert_eq!(sdb.status(), 0x77);
        assert_eq!(sdb.error(), 0x04);
        assert_eq!(sdb.sactive(), 1);
    }

    #[test]
    fn test_dma_setup_fields() {
        let mut raw = [0u8; DMA_SETUP_FIS_LEN];
        raw[0] = 0x41;
        raw[1] = 0xA0;
        raw[16..20].copy_from_slice(&0x200u32.to_le_bytes());
        raw[20..24].copy_from_slice(&0x1000u32.to_le_bytes());
        let fis = DmaSetupFis::from_bytes(&raw).unwrap();
        assert!(fis.auto_activate());
        assert!(fis.is_device_to_host());
        assert_eq!(fis.buffer_offset(), 0x200);
        assert_eq!(fis.transfer_count(), 0x1000);
    }

    #[test]
    fn test_data_fis_bounds() {
        assert!(DataFis::from_bytes(&[0x46, 0, 0, 0]).is_ok());
        assert_eq!(
            DataFis::from_bytes(&[0x46, 0, 0, 0, 1]),
            Err(FisError::BadDataLength(5))
        );
        let big = vec![0x46u8; DATA_FIS_MAX_LEN + 4];
        assert_eq!(
            DataFis::from_bytes(&big),
            Err(FisError::BadDataLength(DATA_FIS_MAX_LEN + 4))
        );
        let mut ok = vec![0u8; 12];
        ok[0] = 0x46;
        ok[4] = 0xAA;
        assert_eq!(DataFis::from_bytes(&ok).unwrap().payload()[0], 0xAA);
    }

    #[test]
    fn test_fis_type_lengths() {
        assert_eq!(FisType::from_byte(0xA1), Some(FisType::SetDeviceBits));
        assert_eq!(FisType::Bist.frame_len(), Some(12));
        assert_eq!(FisType::Data.frame_len(), None);
        assert_eq!(FisType::from_byte(0x00), None);
    }
}
