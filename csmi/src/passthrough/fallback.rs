//! ATA delivery with protocol fallback
//!
//! ```text
//!   Stp ──RetryAsSsp──► SatOverSsp (85h) ──invalid opcode──► LegacyOverSsp (A1h)
//!    │                      │                                    │
//!    └── done               └── done, or other sense: stop       └── done or stop
//! ```
//!
//! The chain only moves right and each step runs at most once per call.
//! The endpoint remembers the last working route, so later commands start
//! there.

use csmi_scsi::sat::{ata_pass_through_12, ata_pass_through_16};
use csmi_scsi::sense::parse_ata_status_return;
use csmi_scsi::{Cdb, ScsiError};

use super::ssp::execute_ssp;
use super::stp::{execute_stp, StpOutcome};
use super::{AtaRequest, AtaRoute, Endpoint, ScsiRequest};
use crate::command::Controller;
use crate::error::CsmiResult;

enum SatOutcome {
    Completed,
    InvalidOpcode,
}

/// Issue an ATA command on the endpoint's current route
pub fn issue_ata(ctrl: &Controller, ep: &mut Endpoint, req: &mut AtaRequest<'_>) -> CsmiResult<()> {
    let mut route = ep.ata_route;

    if route == AtaRoute::Stp {
        match execute_stp(ctrl, ep, req)? {
            StpOutcome::Completed => return Ok(()),
            StpOutcome::RetryAsSsp => {
                route = AtaRoute::SatOverSsp;
                ep.ata_route = route;
            }
        }
    }

    if route == AtaRoute::SatOverSsp {
        let cdb = ata_pass_through_16(&req.command);
        match sat_over_ssp(ctrl, ep, req, cdb)? {
            SatOutcome::Completed => return Ok(()),
            SatOutcome::InvalidOpcode => {
                log::debug!(
                    "phy {}: ATA PASS-THROUGH(16) rejected, falling back to 12-byte CDB",
                    ep.phy
                );
                route = AtaRoute::LegacyOverSsp;
                ep.ata_route = route;
            }
        }
    }

    debug_assert_eq!(route, AtaRoute::LegacyOverSsp);
    let cdb = ata_pass_through_12(&req.command)?;
    match sat_over_ssp(ctrl, ep, req, cdb)? {
        SatOutcome::Completed => Ok(()),
        SatOutcome::InvalidOpcode => Err(ScsiError::CheckCondition {
            sense_key: csmi_scsi::SenseKey::IllegalRequest,
            asc: csmi_scsi::asc::INVALID_OPCODE,
            ascq: csmi_scsi::ascq::NONE,
        }
        .into()),
    }
}

/// Send one SAT CDB and translate the outcome back into ATA terms
fn sat_over_ssp(
    ctrl: &Controller,
    ep: &Endpoint,
    req: &mut AtaRequest<'_>,
    cdb: Cdb,
) -> CsmiResult<SatOutcome> {
    let mut scsi = ScsiRequest::new(cdb, req.data.reborrow());
    scsi.timeout = req.timeout;
    execute_ssp(ctrl, ep, &mut scsi)?;

    let status = scsi.status;
    let sense = scsi.sense.clone();
    drop(scsi);
    req.sense = sense;
    req.status_fis = None;
    req.scr = None;
    req.registers = parse_ata_status_return(req.sense.as_slice());

    if status.is_good() || req.registers.is_some() {
        return Ok(SatOutcome::Completed);
    }
    match req.sense.summary() {
        Some(summary) if summary.is_invalid_opcode() => Ok(SatOutcome::InvalidOpcode),
        Some(summary) => Err(ScsiError::CheckCondition {
            sense_key: summary.sense_key,
            asc: summary.asc,
            ascq: summary.ascq,
        }
        .into()),
        None => Err(ScsiError::Status(status).into()),
    }
}
