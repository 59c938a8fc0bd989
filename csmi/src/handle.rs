//! Device handle strings
//!
//! ```text
//! csmi:<controller>[:N]:<port>:<phy>:<lun>[:<base handle>]
//! ```
//!
//! With the `N` marker the two fields after it are the OS path and target
//! identifiers instead of port and phy. The trailing base handle names the
//! device node to open and is only accepted off Windows.

use core::fmt;
use core::str::FromStr;

use crate::error::CsmiError;

/// Handle prefix
pub const HANDLE_PREFIX: &str = "csmi";

/// Alternate address marker
const ALTERNATE_MARKER: &str = "N";

/// Parsed device handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalAddress {
    /// Controller number
    pub controller: u32,
    /// Port identifier, or path identifier when `alternate`
    pub port: u8,
    /// Phy identifier, or target identifier when `alternate`
    pub phy: u8,
    /// Logical unit
    pub lun: u8,
    /// Fields carry path/target instead of port/phy
    pub alternate: bool,
    /// Device node to open instead of the default
    pub base: Option<String>,
}

impl LogicalAddress {
    /// Port/phy form
    pub fn new(controller: u32, port: u8, phy: u8, lun: u8) -> Self {
        Self {
            controller,
            port,
            phy,
            lun,
            alternate: false,
            base: None,
        }
    }

    /// Path/target form
    pub fn alternate(controller: u32, path: u8, target: u8, lun: u8) -> Self {
        Self {
            alternate: true,
            ..Self::new(controller, path, target, lun)
        }
    }

    /// Builder: base handle
    pub fn with_base(mut self, base: Option<String>) -> Self {
        self.base = base;
        self
    }

    /// OS path identifier, alternate form only
    pub fn path(&self) -> Option<u8> {
        self.alternate.then_some(self.port)
    }

    /// OS target identifier, alternate form only
    pub fn target(&self) -> Option<u8> {
        self.alternate.then_some(self.phy)
    }
}

fn field<T: FromStr>(handle: &str, name: &str, text: Option<&str>) -> Result<T, CsmiError> {
    let text = text.ok_or_else(|| CsmiError::BadParameter(format!("{handle}: missing {name}")))?;
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CsmiError::BadParameter(format!("{handle}: bad {name} '{text}'")));
    }
    text.parse()
        .map_err(|_| CsmiError::BadParameter(format!("{handle}: {name} '{text}' out of range")))
}

impl FromStr for LogicalAddress {
    type Err = CsmiError;

    fn from_str(handle: &str) -> Result<Self, Self::Err> {
        let rest = handle
            .strip_prefix(HANDLE_PREFIX)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| CsmiError::BadParameter(format!("{handle}: not a csmi handle")))?;

        let mut parts = rest.splitn(5, ':');
        let controller = field(handle, "controller", parts.next())?;

        let mut next = parts.next();
        let alternate = next == Some(ALTERNATE_MARKER);
        if alternate {
            // The marker took one split; re-split what is left
            let tail = rest
                .splitn(3, ':')
                .nth(2)
                .ok_or_else(|| CsmiError::BadParameter(format!("{handle}: missing path")))?;
            parts = tail.splitn(4, ':');
            next = parts.next();
        }

        let (first, second) = if alternate { ("path", "target") } else { ("port", "phy") };
        let port = field(handle, first, next)?;
        let phy = field(handle, second, parts.next())?;
        let lun = field(handle, "lun", parts.next())?;

        let base = match parts.next() {
            None => None,
            Some("") => return Err(CsmiError::BadParameter(format!("{handle}: empty base handle"))),
            Some(_) if cfg!(windows) => {
                return Err(CsmiError::BadParameter(format!(
                    "{handle}: base handle not supported on this platform"
                )))
            }
            Some(base) => Some(base.to_string()),
        };

        Ok(Self {
            controller,
            port,
            phy,
            lun,
            alternate,
            base,
        })
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", HANDLE_PREFIX, self.controller)?;
        if self.alternate {
            write!(f, ":{}", ALTERNATE_MARKER)?;
        }
        write!(f, ":{}:{}:{}", self.port, self.phy, self.lun)?;
        if let Some(base) = &self.base {
            write!(f, ":{}", base)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let addr: LogicalAddress = "csmi:0:1:2:0".parse().unwrap();
        assert_eq!(addr.controller, 0);
        assert_eq!(addr.port, 1);
        assert_eq!(addr.phy, 2);
        assert_eq!(addr.lun, 0);
        assert!(!addr.alternate);
        assert_eq!(addr.base, None);
        assert_eq!(addr.path(), None);
    }

    #[test]
    fn test_parse_alternate() {
        let addr: LogicalAddress = "csmi:3:N:0:5:1".parse().unwrap();
        assert_eq!(addr.controller, 3);
        assert!(addr.alternate);
        assert_eq!(addr.path(), Some(0));
        assert_eq!(addr.target(), Some(5));
        assert_eq!(addr.lun, 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_parse_base_handle() {
        let addr: LogicalAddress = "csmi:2:0:4:0:/dev/sg3".parse().unwrap();
        assert_eq!(addr.phy, 4);
        assert_eq!(addr.base.as_deref(), Some("/dev/sg3"));

        let addr: LogicalAddress = "csmi:2:N:1:4:0:/dev/sg3".parse().unwrap();
        assert_eq!(addr.target(), Some(4));
        assert_eq!(addr.base.as_deref(), Some("/dev/sg3"));
    }

    #[cfg(windows)]
    #[test]
    fn test_base_handle_rejected_on_windows() {
        assert!("csmi:2:0:4:0:/dev/sg3".parse::<LogicalAddress>().is_err());
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "csmi",
            "csmi:",
            "scsi:0:1:2:0",
            "csmi:0:1:2",
            "csmi:0:N:1:2",
            "csmi:x:1:2:0",
            "csmi:0:1:-2:0",
            "csmi:0:1:256:0",
            "csmi:0:1:2:0:",
            "csmi:0: 1:2:0",
        ] {
            assert!(
                matches!(bad.parse::<LogicalAddress>(), Err(CsmiError::BadParameter(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let mut handles = vec!["csmi:0:1:2:0", "csmi:7:N:0:12:3", "csmi:4294967295:255:255:255"];
        if cfg!(not(windows)) {
            handles.push("csmi:1:0:3:0:/dev/sg1");
        }
        for handle in handles {
            let addr: LogicalAddress = handle.parse().unwrap();
            assert_eq!(addr.to_string(), handle);
            assert_eq!(addr.to_string().parse::<LogicalAddress>().unwrap(), addr);
        }
    }
}
