//! # SeriLine Core Library
//!
//! Portable POSIX serial-line configuration.
//!
//! This library provides:
//! - Opening tty devices by platform port index or explicit path
//! - Baud rate negotiation, including custom rates outside the standard
//!   termios enumeration (divisor-based on Linux, direct-speed on Darwin)
//! - Framing parameters (data bits, stop bits, parity) and flow control
//! - Read-timeout control mapped onto the VTIME/VMIN blocking-read fields
//! - Modem control-line inspection and assertion (RTS/DTR, CTS/DSR/DCD/RI)
//! - Break-condition generation
//!
//! All calls are synchronous one-shot ioctls against a single descriptor;
//! callers sharing a port across threads must serialize externally.
//!
//! ## Example
//!
//! ```rust,ignore
//! use seriline_core::{ParamsUpdate, Parity, SerialPort};
//!
//! let mut port = SerialPort::open("/dev/ttyUSB0")?;
//! let params = port.configure(
//!     &ParamsUpdate::new()
//!         .data_rate(115_200)
//!         .data_bits(8)
//!         .stop_bits(1)
//!         .parity(Parity::None),
//! )?;
//! println!("configured: {:?}", params);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod params;
pub mod ports;
pub mod signals;

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
mod custom_baud;
mod port;
mod termios;
mod timeout;

pub use error::SerialError;
pub use params::{FlowControl, ModemParams, ParamsUpdate, Parity, CUSTOM_BAUD_CEILING};
pub use port::SerialPort;
pub use ports::{PortSelector, DEFAULT_PORTS};
pub use signals::LineSignals;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
