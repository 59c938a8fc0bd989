//! External collaborators
//!
//! The library reaches the OS, a generic passthrough executor, a software
//! SAT translator and the driver access policy only through these traits.
//! [`Collaborators::default`] wires in the built-in implementations.

use core::fmt;
use std::sync::Arc;

use crate::command::Controller;
use crate::driver::SecurityAccess;
use crate::error::CsmiResult;
use crate::passthrough::{execute_ssp, issue_ata, AtaRequest, Command, Endpoint, ScsiRequest};
use crate::transport::{CsmiTransport, IoctlTransport};

/// Opens the controller-wide OS handle
pub trait HandleOpener: Send + Sync + fmt::Debug {
    /// Open controller `controller`, or the node named by `base`
    fn open(&self, base: Option<&str>, controller: u32) -> CsmiResult<Box<dyn CsmiTransport>>;
}

/// Executes one passthrough command on an endpoint
pub trait PassthroughFacade: Send + Sync + fmt::Debug {
    /// Issue `command`; the endpoint may learn a new ATA route
    fn execute(
        &self,
        ctrl: &Controller,
        ep: &mut Endpoint,
        command: &mut Command<'_>,
    ) -> CsmiResult<()>;
}

/// Translates SCSI commands into ATA for devices without hardware SAT
pub trait SatTranslator: Send + Sync + fmt::Debug {
    /// Translator is usable
    fn is_available(&self) -> bool;

    /// Translate `req`, issuing ATA commands through `issue`
    fn translate(
        &self,
        req: &mut ScsiRequest<'_>,
        issue: &mut dyn FnMut(&mut AtaRequest<'_>) -> CsmiResult<()>,
    ) -> CsmiResult<()>;
}

/// Access level the system grants CSMI callers for a driver
pub trait AccessPolicy: Send + Sync + fmt::Debug {
    /// Level for `driver_name`
    fn access_level(&self, driver_name: &str) -> SecurityAccess;
}

// =============================================================================
// DEFAULTS
// =============================================================================

/// Opens OS device nodes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHandleOpener;

impl SystemHandleOpener {
    /// Node path for a controller
    pub fn node_path(base: Option<&str>, controller: u32) -> String {
        if cfg!(windows) {
            format!("\\\\.\\SCSI{}:", controller)
        } else {
            match base {
                Some(base) => base.to_string(),
                None => format!("/dev/sg{}", controller),
            }
        }
    }
}

impl HandleOpener for SystemHandleOpener {
    fn open(&self, base: Option<&str>, controller: u32) -> CsmiResult<Box<dyn CsmiTransport>> {
        let path = Self::node_path(base, controller);
        log::debug!("opening controller {} at {}", controller, path);
        Ok(Box::new(IoctlTransport::open(&path)?))
    }
}

/// CSMI SSP/STP passthrough with protocol fallback
#[derive(Debug, Default, Clone, Copy)]
pub struct CsmiPassthrough;

impl PassthroughFacade for CsmiPassthrough {
    fn execute(
        &self,
        ctrl: &Controller,
        ep: &mut Endpoint,
        command: &mut Command<'_>,
    ) -> CsmiResult<()> {
        match command {
            Command::Scsi(req) => execute_ssp(ctrl, ep, req),
            Command::Ata(req) => issue_ata(ctrl, ep, req),
        }
    }
}

/// No software translation available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSatTranslator;

impl SatTranslator for NoSatTranslator {
    fn is_available(&self) -> bool {
        false
    }

    fn translate(
        &self,
        _req: &mut ScsiRequest<'_>,
        _issue: &mut dyn FnMut(&mut AtaRequest<'_>) -> CsmiResult<()>,
    ) -> CsmiResult<()> {
        Err(crate::error::CsmiError::Unsupported("software SAT translation"))
    }
}

/// Grants every driver full access
#[derive(Debug, Default, Clone, Copy)]
pub struct FullAccess;

impl AccessPolicy for FullAccess {
    fn access_level(&self, _driver_name: &str) -> SecurityAccess {
        SecurityAccess::Full
    }
}

/// The set of collaborators a device or enumeration uses
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Handle opener
    pub opener: Arc<dyn HandleOpener>,
    /// Passthrough used for identity probes
    pub passthrough: Arc<dyn PassthroughFacade>,
    /// Software SAT translator
    pub translator: Arc<dyn SatTranslator>,
    /// Driver access policy
    pub access: Arc<dyn AccessPolicy>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            opener: Arc::new(SystemHandleOpener),
            passthrough: Arc::new(CsmiPassthrough),
            translator: Arc::new(NoSatTranslator),
            access: Arc::new(FullAccess),
        }
    }
}

impl Collaborators {
    /// Defaults with a different opener
    pub fn with_opener(opener: Arc<dyn HandleOpener>) -> Self {
        Self {
            opener,
            ..Self::default()
        }
    }
}
