//! # CSMI ATA
//!
//! SATA Frame Information Structures and ATA register sets as they travel
//! through CSMI STP passthrough.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  command    │  AtaCommand, TaskFile, AtaProtocol → H2D FIS      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  fis        │  H2D │ D2H │ PIO Setup │ SDB │ DMA │ BIST │ Data  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  registers  │  AtaResultRegisters (status FIS → task file)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  identify   │  IDENTIFY DEVICE model / serial / capacity        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every frame is a plain byte array. Fields are read and written through
//! explicit offset, mask and shift accessors so the layout never depends on
//! compiler bit-field packing.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod command;
pub mod fis;
pub mod identify;
pub mod registers;

pub use command::{AtaCommand, AtaProtocol, TaskFile, TransferDirection};
pub use fis::{
    BistFis, D2hFis, DataFis, DmaActivateFis, DmaSetupFis, FisType, H2dFis, PioSetupFis,
    SetDeviceBitsFis, StatusFis,
};
pub use identify::IdentifyData;
pub use registers::{AtaError, AtaResultRegisters, AtaStatus};

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Frame decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FisError {
    /// Buffer shorter than the frame
    #[error("frame too short: need {needed} bytes, got {got}")]
    TooShort {
        /// Bytes the frame requires
        needed: usize,
        /// Bytes supplied
        got: usize,
    },
    /// Type byte does not match the expected frame
    #[error("unexpected FIS type {0:#04x}")]
    UnexpectedType(u8),
    /// Data FIS length outside 4..=8196 or not dword aligned
    #[error("invalid data FIS length {0}")]
    BadDataLength(usize),
}

/// Result type for frame operations
pub type FisResult<T> = Result<T, FisError>;

pub(crate) fn check_len(data: &[u8], needed: usize) -> FisResult<()> {
    if data.len() < needed {
        return Err(FisError::TooShort {
            needed,
            got: data.len(),
        });
    }
    Ok(())
}
