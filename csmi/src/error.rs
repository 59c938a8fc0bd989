//! Error types
//!
//! Three tiers: the OS call failed (`Transport`), the driver answered with a
//! non-success return code (`NotSupported`, `PermissionDenied`, `Failed`),
//! or no device matched the requested identity (`NoMatch`).

use std::io;

use csmi_ata::FisError;
use csmi_scsi::ScsiError;

use crate::driver::SecurityAccess;
use crate::ioctl::driver::ControllerState;
use crate::ioctl::status::ReturnCode;

/// CSMI errors
#[derive(Debug, thiserror::Error)]
pub enum CsmiError {
    /// The IOCTL itself failed (invalid handle, OS error, timeout)
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// Driver reported the request as unsupported
    #[error("not supported by the controller driver: {code}")]
    NotSupported {
        /// Raw return code
        code: ReturnCode,
    },

    /// Driver refused a write
    #[error("permission denied by the controller driver: {code}")]
    PermissionDenied {
        /// Raw return code
        code: ReturnCode,
    },

    /// Driver reported a failure
    #[error("controller driver failure: {code}")]
    Failed {
        /// Raw return code
        code: ReturnCode,
    },

    /// No endpoint matched the requested identity
    #[error("no matching device")]
    NoMatch,

    /// More than one endpoint matched
    #[error("ambiguous device match: {0}")]
    Ambiguous(String),

    /// Request cannot be expressed on this device or route
    #[error("unsupported request: {0}")]
    Unsupported(&'static str),

    /// The driver access policy forbids the request
    #[error("driver access level {level:?} forbids this request")]
    AccessDenied {
        /// Access level in force
        level: SecurityAccess,
    },

    /// Controller probe found the controller unusable
    #[error("controller unavailable: {state:?}")]
    ControllerUnavailable {
        /// Reported controller state
        state: ControllerState,
    },

    /// Malformed caller input
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// Buffer allocation failed
    #[error("memory allocation failed")]
    MemoryFailure,

    /// Caller built against a different device structure version
    #[error("device structure version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this library implements
        expected: u32,
        /// Version the caller passed
        found: u32,
    },

    /// Response shorter than its structure
    #[error("{what} truncated: need {needed} bytes, got {got}")]
    Truncated {
        /// Structure name
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes returned
        got: usize,
    },

    /// SCSI encoding or decoding failure
    #[error(transparent)]
    Scsi(#[from] ScsiError),

    /// Frame decoding failure
    #[error(transparent)]
    Fis(#[from] FisError),
}

impl CsmiError {
    /// Not supported, including identity resolution failures
    pub fn is_not_supported(&self) -> bool {
        matches!(
            self,
            CsmiError::NotSupported { .. } | CsmiError::NoMatch | CsmiError::Unsupported(_)
        )
    }

    /// Return code carried by a driver-reported error
    pub fn return_code(&self) -> Option<ReturnCode> {
        match self {
            CsmiError::NotSupported { code }
            | CsmiError::PermissionDenied { code }
            | CsmiError::Failed { code } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for CSMI operations
pub type CsmiResult<T> = Result<T, CsmiError>;

pub(crate) fn check_len(what: &'static str, data: &[u8], needed: usize) -> CsmiResult<()> {
    if data.len() < needed {
        return Err(CsmiError::Truncated {
            what,
            needed,
            got: data.len(),
        });
    }
    Ok(())
}
