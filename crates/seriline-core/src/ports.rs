//! Port selection and platform default device tables

use std::path::{Path, PathBuf};

use crate::error::SerialError;

/// Default serial device paths, indexed by port number.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const DEFAULT_PORTS: &[&str] = &[
    "/dev/ttyS0", "/dev/ttyS1", "/dev/ttyS2", "/dev/ttyS3",
    "/dev/ttyS4", "/dev/ttyS5", "/dev/ttyS6", "/dev/ttyS7",
];

/// Default serial device paths, indexed by port number.
#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
pub const DEFAULT_PORTS: &[&str] = &[
    "/dev/cuaa0", "/dev/cuaa1", "/dev/cuaa2", "/dev/cuaa3",
    "/dev/cuaa4", "/dev/cuaa5", "/dev/cuaa6", "/dev/cuaa7",
];

/// Default serial device paths, indexed by port number.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
pub const DEFAULT_PORTS: &[&str] = &[];

/// Identifies the device to open: an index into [`DEFAULT_PORTS`] or an
/// explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelector {
    /// Index into the platform default port table.
    Index(usize),
    /// Explicit device path.
    Path(PathBuf),
}

impl PortSelector {
    /// Resolves the selector to a concrete device path.
    pub fn resolve(&self) -> Result<PathBuf, SerialError> {
        match self {
            PortSelector::Index(index) => DEFAULT_PORTS
                .get(*index)
                .map(PathBuf::from)
                .ok_or(SerialError::InvalidPortSelector(*index)),
            PortSelector::Path(path) => Ok(path.clone()),
        }
    }
}

impl From<usize> for PortSelector {
    fn from(index: usize) -> PortSelector {
        PortSelector::Index(index)
    }
}

impl From<&str> for PortSelector {
    fn from(path: &str) -> PortSelector {
        PortSelector::Path(PathBuf::from(path))
    }
}

impl From<String> for PortSelector {
    fn from(path: String) -> PortSelector {
        PortSelector::Path(PathBuf::from(path))
    }
}

impl From<&Path> for PortSelector {
    fn from(path: &Path) -> PortSelector {
        PortSelector::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for PortSelector {
    fn from(path: PathBuf) -> PortSelector {
        PortSelector::Path(path)
    }
}
