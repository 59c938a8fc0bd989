//! Overlapped `DeviceIoControl` transport
//!
//! Every CSMI request goes through `IOCTL_SCSI_MINIPORT`; the operation is
//! carried in the `SRB_IO_CONTROL` header. A pending request is waited on
//! synchronously.

use std::ffi::OsStr;
use std::io;
use std::iter;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::ERROR_IO_PENDING;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::ioapiset::{DeviceIoControl, GetOverlappedResult};
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::synchapi::CreateEventW;
use winapi::um::winbase::FILE_FLAG_OVERLAPPED;
use winapi::um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE, GENERIC_READ, GENERIC_WRITE, HANDLE};

use super::CsmiTransport;
use crate::ioctl::ControlCode;

/// `CTL_CODE(IOCTL_SCSI_BASE, 0x0402, METHOD_BUFFERED, FILE_READ_ACCESS | FILE_WRITE_ACCESS)`
const IOCTL_SCSI_MINIPORT: DWORD = 0x0004_D008;

#[derive(Debug)]
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned valid by the OS and is closed once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// Open `\\.\SCSI<n>:` handle
#[derive(Debug)]
pub struct IoctlTransport {
    handle: OwnedHandle,
    path: String,
}

// SAFETY: the handle is only used through `&self` calls that the OS
// serializes; it is never shared without ownership.
unsafe impl Send for IoctlTransport {}

fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(iter::once(0)).collect()
}

impl IoctlTransport {
    /// Open a controller handle for overlapped I/O
    pub fn open(path: &str) -> io::Result<Self> {
        let name = wide(path);
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let handle = unsafe {
            CreateFileW(
                name.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        log::debug!("opened {}", path);
        Ok(Self {
            handle: OwnedHandle(handle),
            path: path.to_string(),
        })
    }

    /// Device path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl CsmiTransport for IoctlTransport {
    fn ioctl(&self, _code: ControlCode, buffer: &mut [u8]) -> io::Result<()> {
        let len = DWORD::try_from(buffer.len())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

        // SAFETY: null attributes and name are allowed.
        let event = unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if event.is_null() {
            return Err(io::Error::last_os_error());
        }
        let event = OwnedHandle(event);

        // SAFETY: OVERLAPPED is plain data; all-zero is its initial state.
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event.0;
        let mut returned: DWORD = 0;

        // SAFETY: `buffer` and `overlapped` stay alive until the request
        // completes, which GetOverlappedResult waits for.
        unsafe {
            let ok = DeviceIoControl(
                self.handle.0,
                IOCTL_SCSI_MINIPORT,
                buffer.as_mut_ptr().cast(),
                len,
                buffer.as_mut_ptr().cast(),
                len,
                &mut returned,
                &mut overlapped,
            );
            if ok == FALSE {
                let err = GetLastError();
                if err != ERROR_IO_PENDING {
                    return Err(io::Error::from_raw_os_error(err as i32));
                }
                let done = GetOverlappedResult(self.handle.0, &mut overlapped, &mut returned, TRUE);
                if done == FALSE {
                    return Err(io::Error::last_os_error());
                }
            }
        }
        Ok(())
    }
}
