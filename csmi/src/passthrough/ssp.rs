//! SSP passthrough

use csmi_ata::TransferDirection;
use csmi_scsi::ScsiStatus;

use super::{Endpoint, ScsiRequest};
use crate::buffer::AlignedBuffer;
use crate::command::Controller;
use crate::error::{CsmiError, CsmiResult};
use crate::ioctl::passthru::{
    data_len_u32, SspFlags, SspParameters, SspStatus, OPEN_ACCEPT, SSP_FIXED_LEN, SSP_PARAMS_LEN,
};
use crate::ioctl::{ControlCode, ReturnCode, HEADER_LEN};

fn flags_for(direction: TransferDirection) -> SspFlags {
    match direction {
        TransferDirection::In => SspFlags::READ,
        TransferDirection::Out => SspFlags::WRITE,
        TransferDirection::None => SspFlags::UNSPECIFIED,
    }
}

/// Send a CDB to `ep` and wait for completion
///
/// On return `req.status` holds the SCSI status. Sense data is copied only
/// when the response flags it; otherwise `req.sense` is cleared. Inbound
/// data is copied only when the driver reports transferred bytes;
/// otherwise the caller's buffer is zeroed.
pub fn execute_ssp(ctrl: &Controller, ep: &Endpoint, req: &mut ScsiRequest<'_>) -> CsmiResult<()> {
    let data_len = req.data.len();
    let mut buf = AlignedBuffer::zeroed(HEADER_LEN + SSP_FIXED_LEN + data_len)?;
    {
        let payload = &mut buf.as_mut_slice()[HEADER_LEN..];
        SspParameters {
            phy: ep.phy,
            port: ep.port,
            connection_rate: ep.connection_rate,
            destination: ep.sas_address,
            lun: ep.lun,
            cdb: req.cdb.as_slice(),
            flags: flags_for(req.data.direction()),
            data_len: data_len_u32(data_len)?,
        }
        .encode(payload)?;
        req.data.stage(&mut payload[SSP_FIXED_LEN..]);
    }

    let timeout = req.timeout;
    let outcome = ctrl.issue_raw(ControlCode::SspPassthru, &mut buf, |r| r.timeout(timeout), None)?;
    outcome.return_code.into_result()?;

    let payload = &buf.as_slice()[HEADER_LEN..];
    let status = SspStatus::decode(&payload[SSP_PARAMS_LEN..])?;
    if status.connection_status != OPEN_ACCEPT {
        log::debug!(
            "ssp to {} phy {}: connection status {:#04x}",
            ep.sas_address,
            ep.phy,
            status.connection_status
        );
        return Err(CsmiError::Failed {
            code: ReturnCode::CONNECTION_FAILED,
        });
    }

    req.status = ScsiStatus::from_byte(status.status);
    match status.sense() {
        Some(sense) => req.sense.set(sense),
        None => req.sense.clear(),
    }
    req.data
        .complete(&payload[SSP_FIXED_LEN..], status.data_bytes as usize);

    if let Some(summary) = req.sense.summary() {
        log::debug!(
            "ssp {:#04x} to {}: {:?} {:?} asc {:#04x} ascq {:#04x}",
            req.cdb.opcode(),
            ep.sas_address,
            req.status,
            summary.sense_key,
            summary.asc,
            summary.ascq
        );
    }
    Ok(())
}
