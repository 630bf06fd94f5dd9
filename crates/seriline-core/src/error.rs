//! Serial-line configuration errors

use std::io;

use thiserror::Error;

/// Errors that can occur while opening or configuring a serial line
#[derive(Error, Debug)]
pub enum SerialError {
    /// A numeric port selector was outside the platform port table.
    #[error("port index {0} is out of range for this platform")]
    InvalidPortSelector(usize),

    /// The device could not be opened, typically permissions or nonexistence.
    #[error("failed to open {path}: {source}")]
    OpenFailure {
        /// Device path that was being opened.
        path: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The opened descriptor does not refer to a terminal device.
    #[error("{0} is not a terminal device")]
    NotATerminal(String),

    /// A requested parameter value is outside the supported enumeration.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The platform or driver lacks the requested capability.
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(&'static str),

    /// Reading the terminal attribute structure failed.
    #[error("failed to read terminal attributes: {0}")]
    AttributeRead(#[source] io::Error),

    /// Committing the terminal attribute structure failed; the device keeps
    /// its prior configuration.
    #[error("failed to write terminal attributes: {0}")]
    AttributeWrite(#[source] io::Error),

    /// The custom baud rate side channel itself failed.
    #[error("custom baud rate ioctl failed: {0}")]
    CustomBaudUnsupported(#[source] io::Error),

    /// The custom baud rate request failed a pre-check before reaching the
    /// kernel.
    #[error("custom baud rate rejected: {0}")]
    CustomBaudRejected(String),

    /// Reading or writing the modem control lines failed.
    #[error("modem line control failed: {0}")]
    LineControl(#[source] io::Error),

    /// Generating a break condition failed.
    #[error("failed to send break: {0}")]
    BreakFailure(#[source] io::Error),

    /// The operation has no POSIX implementation.
    #[error("operation not implemented")]
    NotImplemented,
}

impl SerialError {
    /// Underlying OS error code, for the variants that carry one
    pub fn errno(&self) -> Option<i32> {
        match self {
            SerialError::OpenFailure { source, .. }
            | SerialError::AttributeRead(source)
            | SerialError::AttributeWrite(source)
            | SerialError::CustomBaudUnsupported(source)
            | SerialError::LineControl(source)
            | SerialError::BreakFailure(source) => source.raw_os_error(),
            _ => None,
        }
    }
}
