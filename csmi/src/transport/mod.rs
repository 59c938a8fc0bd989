//! Raw IOCTL transport
//!
//! One call issues one CSMI IOCTL. The transport reports two things
//! separately: whether the OS call itself went through (`io::Error`), and
//! the protocol return code the driver wrote into the header. Callers
//! decide what the return code means.
//!
//! ```text
//! ┌──────────────┐  IoctlRequest   ┌───────────┐  ioctl()   ┌──────────┐
//! │   command    │ ──────────────► │  execute  │ ─────────► │  driver  │
//! └──────────────┘                 └───────────┘            └──────────┘
//!        ▲        TransportOutcome       │ zero + fill header
//!        └───────────────────────────────┘
//! ```

use core::fmt;
use core::time::Duration;
use std::io;
use std::time::Instant;

use cfg_if::cfg_if;

use crate::error::{check_len, CsmiResult};
use crate::ioctl::header::HeaderFields;
use crate::ioctl::{
    ControlCode, Direction, IoctlHeaderLayout, NativeHeader, ReturnCode, Signature, HEADER_LEN,
};

cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub use self::windows::IoctlTransport;
    } else if #[cfg(unix)] {
        mod unix;
        pub use self::unix::IoctlTransport;
    }
}

/// Threshold for request/response dumps
pub type Verbosity = log::LevelFilter;

/// A handle able to carry CSMI IOCTLs
///
/// `buffer` holds the native header followed by the payload. The driver
/// updates it in place.
pub trait CsmiTransport: Send + fmt::Debug {
    /// Issue one IOCTL and block until it completes
    fn ioctl(&self, code: ControlCode, buffer: &mut [u8]) -> io::Result<()>;
}

impl<T: CsmiTransport + ?Sized> CsmiTransport for Box<T> {
    fn ioctl(&self, code: ControlCode, buffer: &mut [u8]) -> io::Result<()> {
        (**self).ioctl(code, buffer)
    }
}

// =============================================================================
// TIMING
// =============================================================================

/// Wall-clock duration of one command
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTimer {
    start: Option<Instant>,
    elapsed: Duration,
}

impl CommandTimer {
    /// New, stopped timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Stop timing and keep the elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start.take() {
            self.elapsed = start.elapsed();
        }
    }

    /// Last measured duration
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

// =============================================================================
// REQUEST ENVELOPE
// =============================================================================

/// One IOCTL ready to issue
#[derive(Debug)]
pub struct IoctlRequest<'a> {
    buffer: &'a mut [u8],
    payload_len: usize,
    control_code: ControlCode,
    signature: Signature,
    direction: Direction,
    timeout: Duration,
    controller: u32,
    verbosity: Verbosity,
}

impl<'a> IoctlRequest<'a> {
    /// Request over `buffer`; the payload is everything after the header
    ///
    /// Signature, timeout and direction default from the control code.
    pub fn new(control_code: ControlCode, buffer: &'a mut [u8]) -> CsmiResult<Self> {
        check_len("ioctl buffer", buffer, HEADER_LEN)?;
        Ok(Self {
            payload_len: buffer.len() - HEADER_LEN,
            buffer,
            control_code,
            signature: control_code.signature(),
            direction: control_code.direction(),
            timeout: control_code.default_timeout(),
            controller: 0,
            verbosity: Verbosity::Off,
        })
    }

    /// Override the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Controller number (Linux header)
    pub fn controller(mut self, controller: u32) -> Self {
        self.controller = controller;
        self
    }

    /// Override the direction
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Dump threshold
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// Result of a transport call that reached the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOutcome {
    /// Protocol return code from the header
    pub return_code: ReturnCode,
    /// Payload length the driver reported
    pub returned_len: usize,
    /// Time spent in the OS call
    pub elapsed: Duration,
}

/// Zero and fill the header, issue the IOCTL, read back the header
///
/// The payload region is not touched; callers prepare it beforehand.
pub fn execute(
    transport: &dyn CsmiTransport,
    req: IoctlRequest<'_>,
    timer: Option<&mut CommandTimer>,
) -> CsmiResult<TransportOutcome> {
    let IoctlRequest {
        buffer,
        payload_len,
        control_code,
        signature,
        direction,
        timeout,
        controller,
        verbosity,
    } = req;

    let header = &mut buffer[..HEADER_LEN];
    header.fill(0);
    NativeHeader::write(
        header,
        &HeaderFields {
            control_code,
            signature,
            timeout,
            payload_len: payload_len as u32,
            controller,
            direction,
        },
    );

    let dump = verbosity >= Verbosity::Trace;
    log::debug!(
        "issuing {:?} ({}) on controller {}: {} payload bytes, timeout {}s",
        control_code,
        signature.as_str(),
        controller,
        payload_len,
        timeout.as_secs()
    );
    if dump {
        hex_dump("request", buffer);
    }

    let mut transient = CommandTimer::new();
    let timer = timer.unwrap_or(&mut transient);
    timer.start();
    let result = transport.ioctl(control_code, buffer);
    timer.stop();
    if let Err(err) = result {
        log::debug!("{:?} transport failure: {}", control_code, err);
        return Err(err.into());
    }

    let return_code = NativeHeader::return_code(buffer);
    let returned_len = (NativeHeader::payload_len(buffer) as usize).min(payload_len);
    log::debug!(
        "{:?} returned {} in {:?}",
        control_code,
        return_code,
        timer.elapsed()
    );
    if dump {
        hex_dump("response", buffer);
    }

    Ok(TransportOutcome {
        return_code,
        returned_len,
        elapsed: timer.elapsed(),
    })
}

fn hex_dump(label: &str, data: &[u8]) {
    log::trace!("{} ({} bytes)", label, data.len());
    for (i, line) in data.chunks(16).enumerate() {
        let mut text = String::with_capacity(48);
        for b in line {
            text.push_str(&format!("{:02x} ", b));
        }
        log::trace!("  {:04x}: {}", i * 16, text.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::CsmiError;

    #[derive(Debug, Default)]
    struct Echo {
        seen: Mutex<Vec<(ControlCode, Vec<u8>)>>,
        fail: bool,
    }

    impl CsmiTransport for Echo {
        fn ioctl(&self, code: ControlCode, buffer: &mut [u8]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((code, buffer.to_vec()));
            }
            NativeHeader::set_return_code(buffer, ReturnCode::NO_SATA_SIGNATURE);
            NativeHeader::set_payload_len(buffer, 4);
            Ok(())
        }
    }

    #[test]
    fn test_header_zeroed_and_filled() {
        let echo = Echo::default();
        let mut buf = vec![0xFFu8; HEADER_LEN + 8];
        let req = IoctlRequest::new(ControlCode::SataSignature, &mut buf)
            .unwrap()
            .controller(2);
        let mut timer = CommandTimer::new();
        let out = execute(&echo, req, Some(&mut timer)).unwrap();

        assert_eq!(out.return_code, ReturnCode::NO_SATA_SIGNATURE);
        assert_eq!(out.returned_len, 4);
        assert_eq!(timer.elapsed(), out.elapsed);

        let seen = echo.seen.lock().unwrap();
        let (code, sent) = &seen[0];
        assert_eq!(*code, ControlCode::SataSignature);
        assert_eq!(NativeHeader::return_code(sent), ReturnCode::SUCCESS);
        assert_eq!(NativeHeader::payload_len(sent), 8);
        // Payload bytes are the caller's business
        assert!(sent[HEADER_LEN..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_transport_failure_is_distinct() {
        let echo = Echo { fail: true, ..Default::default() };
        let mut buf = vec![0u8; HEADER_LEN];
        let req = IoctlRequest::new(ControlCode::DriverInfo, &mut buf).unwrap();
        assert!(matches!(execute(&echo, req, None), Err(CsmiError::Transport(_))));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut buf = vec![0u8; HEADER_LEN - 1];
        assert!(IoctlRequest::new(ControlCode::DriverInfo, &mut buf).is_err());
    }

    #[test]
    fn test_timer() {
        let mut timer = CommandTimer::new();
        timer.stop();
        assert_eq!(timer.elapsed(), Duration::ZERO);
        timer.start();
        timer.stop();
        assert!(timer.elapsed() < Duration::from_secs(5));
    }
}
