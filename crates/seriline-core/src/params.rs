//! Modem parameter value types
//!
//! [`ModemParams`] is a full snapshot of a port's line settings;
//! [`ParamsUpdate`] is the partial record used to change them. Neither is
//! persisted anywhere; a snapshot is recomputed from kernel state on every
//! query.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Highest custom baud rate accepted through the platform side channels.
pub const CUSTOM_BAUD_CEILING: u32 = 24_000_000;

/// Parity bit modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Parity bit keeps the count of 1-bits even.
    Even,
    /// Parity bit keeps the count of 1-bits odd.
    Odd,
}

impl Parity {
    /// Numeric code: NONE=0, EVEN=1, ODD=2.
    pub fn code(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Even => 1,
            Parity::Odd => 2,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Parity> {
        match code {
            0 => Some(Parity::None),
            1 => Some(Parity::Even),
            2 => Some(Parity::Odd),
            _ => None,
        }
    }
}

/// Flow control selection: a bitmask combining the software (XON/XOFF) and
/// hardware (RTS/CTS) mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowControl(u8);

impl FlowControl {
    /// No flow control.
    pub const NONE: FlowControl = FlowControl(0);
    /// XON/XOFF byte-based software flow control.
    pub const SOFT: FlowControl = FlowControl(1);
    /// RTS/CTS signal-based hardware flow control.
    pub const HARD: FlowControl = FlowControl(2);

    /// Raw bitmask value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Builds a mask from its raw value, rejecting undefined bits.
    pub fn from_bits(bits: u8) -> Option<FlowControl> {
        if bits <= 3 {
            Some(FlowControl(bits))
        } else {
            None
        }
    }

    /// True when the software mechanism is selected.
    pub fn has_soft(self) -> bool {
        self.0 & Self::SOFT.0 != 0
    }

    /// True when the hardware mechanism is selected.
    pub fn has_hard(self) -> bool {
        self.0 & Self::HARD.0 != 0
    }
}

impl BitOr for FlowControl {
    type Output = FlowControl;

    fn bitor(self, rhs: FlowControl) -> FlowControl {
        FlowControl(self.0 | rhs.0)
    }
}

/// A full snapshot of a port's line parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemParams {
    /// Baud rate in bits per second.
    pub data_rate: u32,
    /// Data bits per character, 5 through 8 (0 if the device reports a size
    /// outside that range).
    pub data_bits: u8,
    /// Stop bits, 1 or 2.
    pub stop_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Flow control mask.
    pub flow_control: FlowControl,
    /// Read timeout in milliseconds: `-1` blocks until the read is
    /// satisfied, `0` waits for the first byte, positive values wait up to
    /// that long for the first byte in 100 ms steps.
    pub read_timeout: i32,
}

/// A partial parameter update; unset fields leave the device untouched.
///
/// Fields are applied in a fixed order (rate, data bits, stop bits, parity,
/// flow control, read timeout). Validation of every supplied field completes
/// before anything is committed to the kernel, so an invalid value leaves
/// the device exactly as it was.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamsUpdate {
    /// Requested baud rate; values outside the standard set are routed
    /// through the platform's custom-rate side channel.
    pub data_rate: Option<u32>,
    /// Requested data bits (5..=8).
    pub data_bits: Option<u8>,
    /// Requested stop bits (1 or 2).
    pub stop_bits: Option<u8>,
    /// Requested parity. When unset and `data_bits` is supplied, a default
    /// is derived from the new size: NONE for 8 data bits, EVEN otherwise.
    pub parity: Option<Parity>,
    /// Requested flow control mask.
    pub flow_control: Option<FlowControl>,
    /// Requested read timeout in milliseconds.
    pub read_timeout: Option<i32>,
}

impl ParamsUpdate {
    /// Creates an update with no fields set.
    pub fn new() -> ParamsUpdate {
        ParamsUpdate::default()
    }

    /// Requests a baud rate.
    pub fn data_rate(mut self, rate: u32) -> ParamsUpdate {
        self.data_rate = Some(rate);
        self
    }

    /// Requests a number of data bits.
    pub fn data_bits(mut self, bits: u8) -> ParamsUpdate {
        self.data_bits = Some(bits);
        self
    }

    /// Requests a number of stop bits.
    pub fn stop_bits(mut self, bits: u8) -> ParamsUpdate {
        self.stop_bits = Some(bits);
        self
    }

    /// Requests a parity mode.
    pub fn parity(mut self, parity: Parity) -> ParamsUpdate {
        self.parity = Some(parity);
        self
    }

    /// Requests a flow control mask.
    pub fn flow_control(mut self, flow: FlowControl) -> ParamsUpdate {
        self.flow_control = Some(flow);
        self
    }

    /// Requests a read timeout in milliseconds.
    pub fn read_timeout(mut self, ms: i32) -> ParamsUpdate {
        self.read_timeout = Some(ms);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.data_rate.is_none()
            && self.data_bits.is_none()
            && self.stop_bits.is_none()
            && self.parity.is_none()
            && self.flow_control.is_none()
            && self.read_timeout.is_none()
    }
}
