//! Serial port sessions
//!
//! A [`SerialPort`] owns one open descriptor on a tty device. Opening
//! establishes a raw baseline (no echo, no line discipline processing, no
//! output post-processing) on top of whatever state the previous user left;
//! framing, rate, flow control and timeouts are then adjusted through
//! [`configure`](SerialPort::configure) and the narrower setters.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::path::{Path, PathBuf};

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
use crate::custom_baud;
use crate::error::SerialError;
use crate::params::{FlowControl, ModemParams, ParamsUpdate};
use crate::ports::PortSelector;
use crate::signals::{self, LineSignals};
use crate::termios::{self, retry_eintr};
use crate::timeout;

/// An open serial line.
///
/// The descriptor is closed when the port is dropped. All operations are
/// synchronous ioctls against that one descriptor; a port shared across
/// threads must be serialized by the caller.
#[derive(Debug)]
pub struct SerialPort {
    file: File,
    path: PathBuf,
    /// Last custom rate handed to IOSSIOSPEED; Darwin has no read-back
    /// channel, so the session remembers it. Zero when a standard rate is
    /// active.
    #[cfg(target_os = "macos")]
    custom_rate: u32,
}

impl SerialPort {
    /// Opens the device named by the selector and applies the raw baseline.
    ///
    /// The device is opened read-write without becoming the controlling
    /// terminal. The baseline disables echo, line editing and output
    /// post-processing, enables the receiver, detaches carrier handling
    /// (CLOCAL, no HUPCL) and leaves reads fully blocking (a read timeout of
    /// `-1`).
    pub fn open(selector: impl Into<PortSelector>) -> Result<SerialPort, SerialError> {
        let path = selector.into().resolve()?;
        let open_failure = |source: io::Error| SerialError::OpenFailure {
            path: path.display().to_string(),
            source,
        };

        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| open_failure(io::Error::from(io::ErrorKind::InvalidInput)))?;

        // O_NONBLOCK only so that open() itself cannot hang on carrier;
        // it is removed again below.
        let fd = retry_eintr(|| unsafe {
            libc::open(
                cpath.as_ptr(),
                libc::O_RDWR | libc::O_NOCTTY | libc::O_NONBLOCK,
            )
        })
        .map_err(open_failure)?;
        let file = unsafe { File::from_raw_fd(fd) };

        if unsafe { libc::isatty(fd) } == 0 {
            return Err(SerialError::NotATerminal(path.display().to_string()));
        }

        let flags = retry_eintr(|| unsafe { libc::fcntl(fd, libc::F_GETFL) })
            .map_err(open_failure)?;
        retry_eintr(|| unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) })
            .map_err(open_failure)?;

        let mut tio = termios::get_attrs(fd)?;
        tio.c_oflag = 0;
        tio.c_lflag = 0;
        tio.c_iflag &= libc::IXON | libc::IXOFF | libc::IXANY;
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        tio.c_cflag &= !libc::HUPCL;
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = 0;
        termios::set_attrs(fd, &tio)?;

        tracing::debug!(path = %path.display(), "opened serial port");

        Ok(SerialPort {
            file,
            path,
            #[cfg(target_os = "macos")]
            custom_rate: 0,
        })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Device path this port was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies a partial parameter update and returns the resulting full
    /// snapshot.
    ///
    /// Every supplied field is validated on an in-memory copy of the
    /// attributes before anything is committed, so a rejected update leaves
    /// the device unchanged. An empty update is a pure query.
    pub fn configure(&mut self, update: &ParamsUpdate) -> Result<ModemParams, SerialError> {
        if update.is_empty() {
            return self.modem_params();
        }

        let fd = self.fd();
        let mut tio = termios::get_attrs(fd)?;
        let staged = termios::stage_update(&mut tio, update)?;

        // A supplied standard rate tears down any lingering divisor state
        // before the speed constant is committed.
        #[cfg(any(target_os = "linux", target_os = "android"))]
        if staged.rate_supplied && staged.custom_rate.is_none() {
            custom_baud::clear(fd)?;
        }

        termios::set_attrs(fd, &tio)?;

        #[cfg(any(target_os = "linux", target_os = "android"))]
        if let Some(rate) = staged.custom_rate {
            custom_baud::set(fd, rate)?;
        }

        #[cfg(target_os = "macos")]
        if staged.rate_supplied {
            // Invalidate before the ioctl: if the custom set fails the
            // device sits at the staged standard constant, and a stale
            // cached rate must not be reported for it.
            self.custom_rate = 0;
            if let Some(rate) = staged.custom_rate {
                custom_baud::set(fd, rate)?;
                self.custom_rate = rate;
            }
        }

        #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
        let _ = staged;

        tracing::debug!(path = %self.path.display(), ?update, "reconfigured serial port");
        self.modem_params()
    }

    /// Reads the current full parameter snapshot from the device.
    pub fn modem_params(&self) -> Result<ModemParams, SerialError> {
        let tio = termios::get_attrs(self.fd())?;
        let decoded = termios::decode(&tio);
        Ok(ModemParams {
            data_rate: self.resolve_rate(decoded.data_rate),
            data_bits: decoded.data_bits,
            stop_bits: decoded.stop_bits,
            parity: decoded.parity,
            flow_control: decoded.flow_control,
            read_timeout: decoded.read_timeout,
        })
    }

    // B38400 doubles as the carrier for divisor-based custom rates, so a
    // decoded 38400 is trusted only when the driver reports no custom
    // divisor.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn resolve_rate(&self, standard: Option<u32>) -> u32 {
        match standard {
            Some(38_400) => match custom_baud::get(self.fd()) {
                0 => 38_400,
                custom => custom,
            },
            Some(rate) => rate,
            None => custom_baud::get(self.fd()),
        }
    }

    #[cfg(target_os = "macos")]
    fn resolve_rate(&self, standard: Option<u32>) -> u32 {
        match standard {
            Some(38_400) if self.custom_rate != 0 => self.custom_rate,
            Some(rate) => rate,
            None => self.custom_rate,
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
    fn resolve_rate(&self, standard: Option<u32>) -> u32 {
        standard.unwrap_or(0)
    }

    /// Replaces the flow control selection, leaving all other parameters
    /// untouched.
    pub fn set_flow_control(&mut self, flow: FlowControl) -> Result<(), SerialError> {
        self.configure(&ParamsUpdate::new().flow_control(flow))
            .map(|_| ())
    }

    /// Current flow control selection.
    pub fn flow_control(&self) -> Result<FlowControl, SerialError> {
        Ok(self.modem_params()?.flow_control)
    }

    /// Replaces the read timeout, leaving all other parameters untouched.
    ///
    /// See [`ModemParams::read_timeout`] for the meaning of negative, zero
    /// and positive values.
    pub fn set_read_timeout(&mut self, ms: i32) -> Result<(), SerialError> {
        let (vtime, vmin) = timeout::encode(ms)?;
        let fd = self.fd();
        let mut tio = termios::get_attrs(fd)?;
        tio.c_cc[libc::VTIME] = vtime;
        tio.c_cc[libc::VMIN] = vmin;
        termios::set_attrs(fd, &tio)
    }

    /// Current read timeout in milliseconds, normalized to the 100 ms
    /// granularity of the underlying VTIME field.
    pub fn read_timeout(&self) -> Result<i32, SerialError> {
        let tio = termios::get_attrs(self.fd())?;
        Ok(timeout::decode(tio.c_cc[libc::VTIME], tio.c_cc[libc::VMIN]))
    }

    /// Write timeouts have no POSIX termios expression; always fails with
    /// [`SerialError::NotImplemented`].
    pub fn set_write_timeout(&mut self, _ms: i32) -> Result<(), SerialError> {
        Err(SerialError::NotImplemented)
    }

    /// Write timeouts have no POSIX termios expression; always fails with
    /// [`SerialError::NotImplemented`].
    pub fn write_timeout(&self) -> Result<i32, SerialError> {
        Err(SerialError::NotImplemented)
    }

    /// Holds the line in the break condition.
    ///
    /// `units` is in tenths of a second; the driver transmits zero bits for
    /// roughly that long (a `units` of 0 sends the minimum break, at least
    /// a quarter second).
    pub fn send_break(&self, units: i32) -> Result<(), SerialError> {
        retry_eintr(|| unsafe { libc::tcsendbreak(self.fd(), units / 3) })
            .map_err(SerialError::BreakFailure)?;
        Ok(())
    }

    /// Snapshot of all six modem control lines from one status read.
    pub fn line_signals(&self) -> Result<LineSignals, SerialError> {
        Ok(LineSignals::from_status(signals::read_status(self.fd())?))
    }

    /// Asserts or deasserts Request To Send.
    pub fn set_rts(&mut self, level: bool) -> Result<(), SerialError> {
        signals::set_line(self.fd(), signals::TIOCM_RTS, level)
    }

    /// Current Request To Send level.
    pub fn rts(&self) -> Result<bool, SerialError> {
        Ok(self.line_signals()?.rts)
    }

    /// Asserts or deasserts Data Terminal Ready.
    pub fn set_dtr(&mut self, level: bool) -> Result<(), SerialError> {
        signals::set_line(self.fd(), signals::TIOCM_DTR, level)
    }

    /// Current Data Terminal Ready level.
    pub fn dtr(&self) -> Result<bool, SerialError> {
        Ok(self.line_signals()?.dtr)
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for SerialPort {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}
