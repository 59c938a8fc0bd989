//! # CSMI
//!
//! Reach SAS and SATA drives that sit behind a RAID/HBA controller through
//! the Common Storage Management Interface IOCTL family.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  enumerate    │  count / list passes over candidate handles       │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  device       │  Device::open, Device::issue, DeviceContext       │
//! │  discovery    │  handle → address → phy → binding                 │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  passthrough  │  SSP │ STP │ fallback (STP → SAT 16 → SAT 12)     │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  command      │  one method per CSMI control code                 │
//! │  ioctl        │  header, return codes, payload codecs             │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  transport    │  ioctl(2) │ DeviceIoControl                       │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The OS handle opener, the passthrough used for identity probes, the
//! software SAT translator and the driver access policy are supplied
//! through [`Collaborators`].
//!
//! ```no_run
//! use csmi::{Collaborators, Device, OpenOptions};
//!
//! let options = OpenOptions::default().with_identity("", "WD-WCC4E1234567");
//! let device = Device::open("csmi:0:0:2:0", &options, &Collaborators::default())?;
//! println!("{:?} via {:?}", device.context().sas_address, device.context().binding);
//! # Ok::<(), csmi::CsmiError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod buffer;
pub mod collab;
pub mod command;
pub mod device;
mod discovery;
pub mod driver;
pub mod enumerate;
pub mod error;
pub mod handle;
pub mod ioctl;
pub mod passthrough;
pub mod transport;

#[cfg(test)]
mod testing;

pub use collab::{AccessPolicy, Collaborators, HandleOpener, PassthroughFacade, SatTranslator};
pub use command::Controller;
pub use device::{
    Device, DeviceContext, ExpectedIdentity, IoBinding, MatchConfidence, OpenOptions,
    DEVICE_STRUCT_VERSION,
};
pub use driver::{DriverFamily, DriverQuirks, SecurityAccess, VendorCapabilities};
pub use enumerate::{
    count_devices, list_devices, Candidate, DeviceCount, EnumerateFlags, EnumerationReport,
    EnumerationStatus,
};
pub use error::{CsmiError, CsmiResult};
pub use handle::LogicalAddress;
pub use passthrough::{AtaRequest, AtaRoute, Command, DataBuffer, Endpoint, ScsiRequest};
pub use transport::{CsmiTransport, Verbosity};
