//! `ioctl(2)` transport
//!
//! Linux CSMI drivers take the control code in the request number
//! (`0xCC77_0000 | code`) and the `IOCTL_HEADER` + payload as the argument.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::CsmiTransport;
use crate::ioctl::ControlCode;

const CSMI_REQUEST_BASE: u32 = 0xCC77_0000;

/// Open controller device node
#[derive(Debug)]
pub struct IoctlTransport {
    file: File,
    path: PathBuf,
}

impl IoctlTransport {
    /// Open a controller node read/write
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        log::debug!("opened {}", path.display());
        Ok(Self { file, path })
    }

    /// Node path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CsmiTransport for IoctlTransport {
    fn ioctl(&self, code: ControlCode, buffer: &mut [u8]) -> io::Result<()> {
        let request = CSMI_REQUEST_BASE | code.code();
        // SAFETY: the fd is open for the lifetime of `self` and the driver
        // accesses at most `buffer.len()` bytes, the length it finds in the
        // header we wrote.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, buffer.as_mut_ptr()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_node() {
        let err = IoctlTransport::open("/nonexistent/csmi-node").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
