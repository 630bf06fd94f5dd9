//! Modem control-line inspection and assertion
//!
//! The six handshake/sense lines are read in one TIOCMGET status word;
//! RTS and DTR are the only settable outputs and are written with a
//! read-modify-write of just the targeted bit.

use std::os::unix::io::RawFd;

use serde::{Deserialize, Serialize};

use crate::error::SerialError;
use crate::termios::retry_eintr;

// Status word bits, identical across Linux and the BSD-derived platforms.
pub(crate) const TIOCM_DTR: libc::c_int = 0x002;
pub(crate) const TIOCM_RTS: libc::c_int = 0x004;
const TIOCM_CTS: libc::c_int = 0x020;
const TIOCM_CAR: libc::c_int = 0x040;
const TIOCM_RNG: libc::c_int = 0x080;
const TIOCM_DSR: libc::c_int = 0x100;

/// Snapshot of the modem control lines, decoded from a single status read.
///
/// Each getter on [`SerialPort`](crate::SerialPort) that returns one line
/// performs its own read, so values observed through separate calls may
/// reflect different instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSignals {
    /// Request To Send (settable output).
    pub rts: bool,
    /// Data Terminal Ready (settable output).
    pub dtr: bool,
    /// Clear To Send (sense only).
    pub cts: bool,
    /// Data Set Ready (sense only).
    pub dsr: bool,
    /// Data Carrier Detect (sense only).
    pub dcd: bool,
    /// Ring Indicator (sense only).
    pub ri: bool,
}

impl LineSignals {
    pub(crate) fn from_status(status: libc::c_int) -> LineSignals {
        LineSignals {
            rts: status & TIOCM_RTS != 0,
            dtr: status & TIOCM_DTR != 0,
            cts: status & TIOCM_CTS != 0,
            dsr: status & TIOCM_DSR != 0,
            dcd: status & TIOCM_CAR != 0,
            ri: status & TIOCM_RNG != 0,
        }
    }
}

/// One TIOCMGET read of the full status word.
pub(crate) fn read_status(fd: RawFd) -> Result<libc::c_int, SerialError> {
    let mut status: libc::c_int = 0;
    retry_eintr(|| unsafe { libc::ioctl(fd, libc::TIOCMGET, &mut status) })
        .map_err(SerialError::LineControl)?;
    Ok(status)
}

/// Sets or clears one output bit, leaving the rest of the word intact.
pub(crate) fn set_line(fd: RawFd, mask: libc::c_int, level: bool) -> Result<(), SerialError> {
    let mut status = read_status(fd)?;
    if level {
        status |= mask;
    } else {
        status &= !mask;
    }
    retry_eintr(|| unsafe { libc::ioctl(fd, libc::TIOCMSET, &status) })
        .map_err(SerialError::LineControl)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_status_word_decoding() {
        let all = TIOCM_RTS | TIOCM_DTR | TIOCM_CTS | TIOCM_DSR | TIOCM_CAR | TIOCM_RNG;
        assert_eq!(
            LineSignals::from_status(all),
            LineSignals {
                rts: true,
                dtr: true,
                cts: true,
                dsr: true,
                dcd: true,
                ri: true,
            }
        );

        assert_eq!(
            LineSignals::from_status(0),
            LineSignals {
                rts: false,
                dtr: false,
                cts: false,
                dsr: false,
                dcd: false,
                ri: false,
            }
        );
    }

    #[test]
    fn test_signals_decode_independently() {
        let signals = LineSignals::from_status(TIOCM_RTS | TIOCM_CAR);
        assert!(signals.rts);
        assert!(signals.dcd);
        assert!(!signals.dtr);
        assert!(!signals.cts);
        assert!(!signals.dsr);
        assert!(!signals.ri);
    }
}
