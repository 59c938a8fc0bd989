//! STP passthrough

use csmi_ata::{AtaProtocol, StatusFis, TransferDirection};
use csmi_scsi::sense::ata_status_return;

use super::{AtaRequest, Endpoint};
use crate::buffer::AlignedBuffer;
use crate::command::Controller;
use crate::error::{CsmiError, CsmiResult};
use crate::ioctl::passthru::{
    data_len_u32, StpFlags, StpParameters, StpStatus, OPEN_ACCEPT, STP_FIXED_LEN, STP_PARAMS_LEN,
};
use crate::ioctl::{ControlCode, ReturnCode, HEADER_LEN};

/// How an STP request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StpOutcome {
    /// Completed; registers and sense are filled
    Completed,
    /// Driver emulates SCSI for this device; send SAT over SSP instead
    RetryAsSsp,
}

/// Protocol and direction flags for a command
pub fn flags_for(protocol: AtaProtocol, direction: TransferDirection) -> StpFlags {
    let proto = match protocol {
        AtaProtocol::NonData => StpFlags::empty(),
        AtaProtocol::PioIn | AtaProtocol::PioOut => StpFlags::PIO,
        AtaProtocol::Dma => StpFlags::DMA,
        AtaProtocol::DmaQueued | AtaProtocol::Fpdma => StpFlags::DMA_QUEUED,
        AtaProtocol::Packet => StpFlags::PACKET,
        AtaProtocol::DeviceDiagnostic => StpFlags::EXECUTE_DIAG,
        AtaProtocol::DeviceReset => StpFlags::RESET_DEVICE,
    };
    let dir = match direction {
        TransferDirection::In => StpFlags::READ,
        TransferDirection::Out => StpFlags::WRITE,
        TransferDirection::None => StpFlags::UNSPECIFIED,
    };
    proto | dir
}

/// Send an H2D FIS to `ep`
///
/// The status FIS is decoded by type: a Register D2H frame and a PIO Setup
/// frame carry the ending status at different offsets. The registers are
/// re-encoded as descriptor sense in `req.sense`.
pub fn execute_stp(
    ctrl: &Controller,
    ep: &Endpoint,
    req: &mut AtaRequest<'_>,
) -> CsmiResult<StpOutcome> {
    let data_len = req.data.len();
    let mut command = req.command;
    command.pm_port = ep.pm_port;

    let mut buf = AlignedBuffer::zeroed(HEADER_LEN + STP_FIXED_LEN + data_len)?;
    {
        let payload = &mut buf.as_mut_slice()[HEADER_LEN..];
        StpParameters {
            phy: ep.phy,
            port: ep.port,
            connection_rate: ep.connection_rate,
            destination: ep.sas_address,
            command_fis: *command.to_h2d().as_bytes(),
            flags: flags_for(command.protocol, req.data.direction()),
            data_len: data_len_u32(data_len)?,
        }
        .encode(payload)?;
        req.data.stage(&mut payload[STP_FIXED_LEN..]);
    }

    let timeout = req.timeout;
    let outcome = ctrl.issue_raw(ControlCode::StpPassthru, &mut buf, |r| r.timeout(timeout), None)?;
    if outcome.return_code == ReturnCode::SCSI_EMULATION {
        log::debug!(
            "stp {:#04x} on phy {}: driver emulates SCSI, retry as SSP",
            command.task_file.command,
            ep.phy
        );
        return Ok(StpOutcome::RetryAsSsp);
    }
    outcome.return_code.into_result()?;

    let payload = &buf.as_slice()[HEADER_LEN..];
    let status = StpStatus::decode(&payload[STP_PARAMS_LEN..])?;
    if status.connection_status != OPEN_ACCEPT {
        log::debug!(
            "stp to {} phy {}: connection status {:#04x}",
            ep.sas_address,
            ep.phy,
            status.connection_status
        );
        req.registers = None;
        req.sense.clear();
        return Err(CsmiError::Failed {
            code: ReturnCode::CONNECTION_FAILED,
        });
    }
    req.status_fis = Some(status.status_fis);
    req.scr = Some(status.scr);
    req.data
        .complete(&payload[STP_FIXED_LEN..], status.data_bytes as usize);

    match StatusFis::parse(&status.status_fis) {
        Ok(fis) => {
            let regs = fis.registers();
            req.registers = Some(regs);
            req.sense = ata_status_return(&regs, command.extended);
            if regs.is_error() {
                log::debug!(
                    "stp {:#04x} on phy {}: status {:#04x} error {:#04x}",
                    command.task_file.command,
                    ep.phy,
                    regs.status,
                    regs.error
                );
            }
            Ok(StpOutcome::Completed)
        }
        Err(err) => {
            req.registers = None;
            req.sense.clear();
            Err(CsmiError::Fis(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use csmi_ata::{AtaCommand, IdentifyData};
    use csmi_scsi::SasAddress;

    use super::*;
    use crate::passthrough::DataBuffer;
    use crate::testing::{SimController, StpBehavior};

    fn endpoint() -> Endpoint {
        Endpoint::new(0, 0, SasAddress::from_u64(0x5000_0000_0000_0001))
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            flags_for(AtaProtocol::PioIn, TransferDirection::In),
            StpFlags::PIO | StpFlags::READ
        );
        assert_eq!(
            flags_for(AtaProtocol::NonData, TransferDirection::None),
            StpFlags::UNSPECIFIED
        );
        assert_eq!(
            flags_for(AtaProtocol::DeviceReset, TransferDirection::None),
            StpFlags::RESET_DEVICE | StpFlags::UNSPECIFIED
        );
    }

    #[test]
    fn test_identify_over_pio_setup() {
        let sim = SimController::new("arcsas");
        sim.add_sata_phy(0, 0, 0x5000_0000_0000_0001);
        sim.set_identity(0, "WDC WD40EFRX", "WD-1234");
        let ctrl = sim.controller(0);

        let mut data = [0u8; 512];
        let mut req = AtaRequest::new(AtaCommand::identify(), DataBuffer::In(&mut data));
        assert_eq!(execute_stp(&ctrl, &endpoint(), &mut req).unwrap(), StpOutcome::Completed);

        // PIO Setup: ending status comes from byte 15
        let regs = req.registers.unwrap();
        assert_eq!(regs.status, 0x50);
        assert_eq!(req.status_fis.unwrap()[0], 0x5F);
        let summary = req.sense.summary().unwrap();
        assert!(summary.is_ata_pass_through_info());
        drop(req);

        let id = IdentifyData::from_bytes(&data).unwrap();
        assert_eq!(id.model_number(), "WDC WD40EFRX");
        assert_eq!(id.serial_number(), "WD-1234");
    }

    #[test]
    fn test_non_data_over_d2h() {
        let sim = SimController::new("arcsas");
        sim.add_sata_phy(0, 0, 0x5000_0000_0000_0001);
        let ctrl = sim.controller(0);
        let mut req = AtaRequest::new(AtaCommand::check_power_mode(), DataBuffer::None);
        execute_stp(&ctrl, &endpoint(), &mut req).unwrap();
        assert_eq!(req.status_fis.unwrap()[0], 0x34);
        assert_eq!(req.registers.unwrap().count, 0xFF);
    }

    #[test]
    fn test_scsi_emulation_is_retry() {
        let sim = SimController::new("rcraid");
        sim.add_sata_phy(0, 0, 0x5000_0000_0000_0001);
        sim.set_stp(StpBehavior::ScsiEmulation);
        let ctrl = sim.controller(0);
        let mut req = AtaRequest::new(AtaCommand::check_power_mode(), DataBuffer::None);
        assert_eq!(execute_stp(&ctrl, &endpoint(), &mut req).unwrap(), StpOutcome::RetryAsSsp);
        assert!(req.registers.is_none());
    }

    #[test]
    fn test_open_reject_is_connection_failure() {
        let sim = SimController::new("arcsas");
        sim.add_sata_phy(0, 0, 0x5000_0000_0000_0001);
        sim.set_stp(StpBehavior::OpenReject);
        let ctrl = sim.controller(0);
        let mut req = AtaRequest::new(AtaCommand::check_power_mode(), DataBuffer::None);
        let err = execute_stp(&ctrl, &endpoint(), &mut req).unwrap_err();
        assert!(matches!(
            err,
            CsmiError::Failed {
                code: ReturnCode::CONNECTION_FAILED
            }
        ));
        assert!(req.registers.is_none());
        assert!(req.status_fis.is_none());
    }

    #[test]
    fn test_pm_port_in_command_fis() {
        let sim = SimController::new("arcsas");
        sim.add_sata_phy(0, 0, 0x5000_0000_0000_0001);
        let ctrl = sim.controller(0);
        let mut ep = endpoint();
        ep.pm_port = 3;
        let mut req = AtaRequest::new(AtaCommand::check_power_mode(), DataBuffer::None);
        execute_stp(&ctrl, &ep, &mut req).unwrap();
        assert_eq!(sim.last_command_fis()[1] & 0x0F, 3);
    }
}
