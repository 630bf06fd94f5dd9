//! Termios attribute staging and decoding
//!
//! Parameter updates are staged entirely on an in-memory `termios` copy and
//! validated field by field before anything touches the kernel, so a rejected
//! update leaves the device configuration untouched. Decoding reverses the
//! mapping from a fetched attribute structure back into [`ModemParams`]
//! values.

use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

use crate::error::SerialError;
use crate::params::{FlowControl, ParamsUpdate, Parity, CUSTOM_BAUD_CEILING};
use crate::timeout;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
const HARD_FLOW_SUPPORTED: bool = true;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
const HARD_FLOW_SUPPORTED: bool = false;

const CUSTOM_BAUD_SUPPORTED: bool = cfg!(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos"
));

/// Retries a libc call returning -1/errno until it succeeds or fails with
/// something other than EINTR.
pub(crate) fn retry_eintr<F>(mut op: F) -> io::Result<libc::c_int>
where
    F: FnMut() -> libc::c_int,
{
    loop {
        let rc = op();
        if rc != -1 {
            return Ok(rc);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

pub(crate) fn get_attrs(fd: RawFd) -> Result<libc::termios, SerialError> {
    let mut tio = MaybeUninit::<libc::termios>::uninit();
    retry_eintr(|| unsafe { libc::tcgetattr(fd, tio.as_mut_ptr()) })
        .map_err(SerialError::AttributeRead)?;
    Ok(unsafe { tio.assume_init() })
}

/// Commits a staged attribute structure with TCSANOW.
pub(crate) fn set_attrs(fd: RawFd, tio: &libc::termios) -> Result<(), SerialError> {
    retry_eintr(|| unsafe { libc::tcsetattr(fd, libc::TCSANOW, tio) })
        .map_err(SerialError::AttributeWrite)?;
    Ok(())
}

/// Speed constant for a standard rate, or `None` for rates that need the
/// custom side channel.
fn baud_to_speed(rate: u32) -> Option<libc::speed_t> {
    match rate {
        50 => Some(libc::B50),
        75 => Some(libc::B75),
        110 => Some(libc::B110),
        134 => Some(libc::B134),
        150 => Some(libc::B150),
        200 => Some(libc::B200),
        300 => Some(libc::B300),
        600 => Some(libc::B600),
        1_200 => Some(libc::B1200),
        1_800 => Some(libc::B1800),
        2_400 => Some(libc::B2400),
        4_800 => Some(libc::B4800),
        9_600 => Some(libc::B9600),
        19_200 => Some(libc::B19200),
        38_400 => Some(libc::B38400),
        57_600 => Some(libc::B57600),
        #[cfg(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        76_800 => Some(libc::B76800),
        115_200 => Some(libc::B115200),
        230_400 => Some(libc::B230400),
        _ => None,
    }
}

/// Inverse of [`baud_to_speed`]; `None` for speed constants outside the
/// standard table.
fn speed_to_baud(speed: libc::speed_t) -> Option<u32> {
    match speed {
        libc::B50 => Some(50),
        libc::B75 => Some(75),
        libc::B110 => Some(110),
        libc::B134 => Some(134),
        libc::B150 => Some(150),
        libc::B200 => Some(200),
        libc::B300 => Some(300),
        libc::B600 => Some(600),
        libc::B1200 => Some(1_200),
        libc::B1800 => Some(1_800),
        libc::B2400 => Some(2_400),
        libc::B4800 => Some(4_800),
        libc::B9600 => Some(9_600),
        libc::B19200 => Some(19_200),
        libc::B38400 => Some(38_400),
        libc::B57600 => Some(57_600),
        #[cfg(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        libc::B76800 => Some(76_800),
        libc::B115200 => Some(115_200),
        libc::B230400 => Some(230_400),
        _ => None,
    }
}

fn set_speed(tio: &mut libc::termios, speed: libc::speed_t) -> Result<(), SerialError> {
    if unsafe { libc::cfsetispeed(tio, speed) } == 0
        && unsafe { libc::cfsetospeed(tio, speed) } == 0
    {
        Ok(())
    } else {
        Err(SerialError::InvalidParameter(
            "baud rate constant rejected by cfsetspeed".into(),
        ))
    }
}

fn set_hard_flow(tio: &mut libc::termios, on: bool) -> Result<(), SerialError> {
    if on && !HARD_FLOW_SUPPORTED {
        return Err(SerialError::UnsupportedCapability("hardware flow control"));
    }
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    if on {
        tio.c_cflag |= libc::CRTSCTS;
    } else {
        tio.c_cflag &= !libc::CRTSCTS;
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    let _ = tio;
    Ok(())
}

fn hard_flow_active(tio: &libc::termios) -> bool {
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    {
        tio.c_cflag & libc::CRTSCTS != 0
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    {
        let _ = tio;
        false
    }
}

/// What a staged update needs from the caller after the attribute commit.
pub(crate) struct Staged {
    /// Rate to route through the custom side channel, if the requested rate
    /// fell outside the standard table.
    pub(crate) custom_rate: Option<u32>,
    /// Whether the update carried a rate at all. A supplied standard rate
    /// must tear down any lingering custom-rate state.
    pub(crate) rate_supplied: bool,
}

/// Applies an update to an in-memory attribute structure.
///
/// Fields are staged in a fixed order: rate, data bits, stop bits, parity,
/// flow control, read timeout. When parity is unset but data bits are
/// supplied, a default is derived from the staged character size: NONE for
/// 8 data bits, EVEN otherwise.
pub(crate) fn stage_update(
    tio: &mut libc::termios,
    update: &ParamsUpdate,
) -> Result<Staged, SerialError> {
    let mut staged = Staged {
        custom_rate: None,
        rate_supplied: update.data_rate.is_some(),
    };

    if let Some(rate) = update.data_rate {
        match baud_to_speed(rate) {
            Some(speed) => set_speed(tio, speed)?,
            None => {
                if !CUSTOM_BAUD_SUPPORTED {
                    return Err(SerialError::UnsupportedCapability("custom baud rates"));
                }
                if rate == 0 || rate > CUSTOM_BAUD_CEILING {
                    return Err(SerialError::InvalidParameter(format!(
                        "baud rate {rate} is out of range (custom rates accepted up to {CUSTOM_BAUD_CEILING})"
                    )));
                }
                // Custom rates ride on B38400; the side channel redirects it
                // after the attribute commit.
                set_speed(tio, libc::B38400)?;
                staged.custom_rate = Some(rate);
            }
        }
    }

    if let Some(bits) = update.data_bits {
        let size = match bits {
            5 => libc::CS5,
            6 => libc::CS6,
            7 => libc::CS7,
            8 => libc::CS8,
            _ => {
                return Err(SerialError::InvalidParameter(format!(
                    "data bits {bits} (expected 5 through 8)"
                )))
            }
        };
        tio.c_cflag = (tio.c_cflag & !libc::CSIZE) | size;
    }

    if let Some(bits) = update.stop_bits {
        match bits {
            1 => tio.c_cflag &= !libc::CSTOPB,
            2 => tio.c_cflag |= libc::CSTOPB,
            _ => {
                return Err(SerialError::InvalidParameter(format!(
                    "stop bits {bits} (expected 1 or 2)"
                )))
            }
        }
    }

    let parity = match (update.parity, update.data_bits) {
        (Some(parity), _) => Some(parity),
        (None, Some(_)) => Some(if tio.c_cflag & libc::CSIZE == libc::CS8 {
            Parity::None
        } else {
            Parity::Even
        }),
        (None, None) => None,
    };
    if let Some(parity) = parity {
        match parity {
            Parity::None => tio.c_cflag &= !(libc::PARENB | libc::PARODD),
            Parity::Even => {
                tio.c_cflag |= libc::PARENB;
                tio.c_cflag &= !libc::PARODD;
            }
            Parity::Odd => tio.c_cflag |= libc::PARENB | libc::PARODD,
        }
    }

    if let Some(flow) = update.flow_control {
        // IXANY rides along so any character restarts paused output
        if flow.has_soft() {
            tio.c_iflag |= libc::IXON | libc::IXOFF | libc::IXANY;
        } else {
            tio.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
        }
        set_hard_flow(tio, flow.has_hard())?;
    }

    if let Some(ms) = update.read_timeout {
        let (vtime, vmin) = timeout::encode(ms)?;
        tio.c_cc[libc::VTIME] = vtime;
        tio.c_cc[libc::VMIN] = vmin;
    }

    Ok(staged)
}

/// Parameter values read out of an attribute structure.
pub(crate) struct Decoded {
    /// Standard rate for the configured speed constant; `None` when the
    /// constant is outside the standard table.
    pub(crate) data_rate: Option<u32>,
    pub(crate) data_bits: u8,
    pub(crate) stop_bits: u8,
    pub(crate) parity: Parity,
    pub(crate) flow_control: FlowControl,
    pub(crate) read_timeout: i32,
}

pub(crate) fn decode(tio: &libc::termios) -> Decoded {
    let speed = unsafe { libc::cfgetospeed(tio) };

    let data_bits = match tio.c_cflag & libc::CSIZE {
        size if size == libc::CS5 => 5,
        size if size == libc::CS6 => 6,
        size if size == libc::CS7 => 7,
        size if size == libc::CS8 => 8,
        _ => 0,
    };

    let parity = if tio.c_cflag & libc::PARENB == 0 {
        Parity::None
    } else if tio.c_cflag & libc::PARODD != 0 {
        Parity::Odd
    } else {
        Parity::Even
    };

    let mut flow_control = FlowControl::NONE;
    if tio.c_iflag & (libc::IXON | libc::IXOFF | libc::IXANY) != 0 {
        flow_control = flow_control | FlowControl::SOFT;
    }
    if hard_flow_active(tio) {
        flow_control = flow_control | FlowControl::HARD;
    }

    Decoded {
        data_rate: speed_to_baud(speed),
        data_bits,
        stop_bits: if tio.c_cflag & libc::CSTOPB != 0 { 2 } else { 1 },
        parity,
        flow_control,
        read_timeout: timeout::decode(tio.c_cc[libc::VTIME], tio.c_cc[libc::VMIN]),
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use pretty_assertions::assert_eq;

    use super::*;

    fn blank() -> libc::termios {
        unsafe { mem::zeroed() }
    }

    #[test]
    fn test_baud_table_round_trip() {
        let rates = [
            50, 75, 110, 134, 150, 200, 300, 600, 1_200, 1_800, 2_400, 4_800, 9_600, 19_200,
            38_400, 57_600, 115_200, 230_400,
        ];
        for rate in rates {
            let speed = baud_to_speed(rate).unwrap();
            assert_eq!(speed_to_baud(speed), Some(rate), "rate {rate}");
        }
        assert_eq!(baud_to_speed(0), None);
        assert_eq!(baud_to_speed(250_000), None);
    }

    #[test]
    fn test_stage_full_frame() {
        let mut tio = blank();
        let staged = stage_update(
            &mut tio,
            &ParamsUpdate::new()
                .data_rate(115_200)
                .data_bits(8)
                .stop_bits(1)
                .parity(Parity::None)
                .flow_control(FlowControl::NONE)
                .read_timeout(250),
        )
        .unwrap();

        assert!(staged.rate_supplied);
        assert_eq!(staged.custom_rate, None);

        let decoded = decode(&tio);
        assert_eq!(decoded.data_rate, Some(115_200));
        assert_eq!(decoded.data_bits, 8);
        assert_eq!(decoded.stop_bits, 1);
        assert_eq!(decoded.parity, Parity::None);
        assert_eq!(decoded.flow_control, FlowControl::NONE);
        assert_eq!(decoded.read_timeout, 300);
    }

    #[test]
    fn test_parity_defaults_follow_data_bits() {
        let mut tio = blank();
        stage_update(&mut tio, &ParamsUpdate::new().data_bits(8)).unwrap();
        assert_eq!(decode(&tio).parity, Parity::None);

        let mut tio = blank();
        stage_update(&mut tio, &ParamsUpdate::new().data_bits(7)).unwrap();
        assert_eq!(decode(&tio).parity, Parity::Even);

        let mut tio = blank();
        stage_update(&mut tio, &ParamsUpdate::new().data_bits(5)).unwrap();
        assert_eq!(decode(&tio).parity, Parity::Even);
    }

    #[test]
    fn test_parity_untouched_without_data_bits() {
        let mut tio = blank();
        stage_update(
            &mut tio,
            &ParamsUpdate::new().data_bits(7).parity(Parity::Odd),
        )
        .unwrap();
        assert_eq!(decode(&tio).parity, Parity::Odd);

        // A later update carrying neither parity nor data bits keeps it
        stage_update(&mut tio, &ParamsUpdate::new().flow_control(FlowControl::SOFT)).unwrap();
        assert_eq!(decode(&tio).parity, Parity::Odd);
    }

    #[test]
    fn test_explicit_parity_overrides_default() {
        let mut tio = blank();
        stage_update(
            &mut tio,
            &ParamsUpdate::new().data_bits(8).parity(Parity::Even),
        )
        .unwrap();
        assert_eq!(decode(&tio).parity, Parity::Even);
    }

    #[test]
    fn test_stop_bits_staging() {
        let mut tio = blank();
        stage_update(&mut tio, &ParamsUpdate::new().stop_bits(2)).unwrap();
        assert_eq!(decode(&tio).stop_bits, 2);
        stage_update(&mut tio, &ParamsUpdate::new().stop_bits(1)).unwrap();
        assert_eq!(decode(&tio).stop_bits, 1);
    }

    #[test]
    fn test_flow_control_staging() {
        let mut tio = blank();

        stage_update(
            &mut tio,
            &ParamsUpdate::new().flow_control(FlowControl::SOFT),
        )
        .unwrap();
        assert_eq!(decode(&tio).flow_control, FlowControl::SOFT);
        assert_ne!(tio.c_iflag & libc::IXANY, 0);

        stage_update(
            &mut tio,
            &ParamsUpdate::new().flow_control(FlowControl::NONE),
        )
        .unwrap();
        assert_eq!(decode(&tio).flow_control, FlowControl::NONE);
        assert_eq!(tio.c_iflag & libc::IXANY, 0);

        if HARD_FLOW_SUPPORTED {
            let both = FlowControl::SOFT | FlowControl::HARD;
            stage_update(&mut tio, &ParamsUpdate::new().flow_control(both)).unwrap();
            assert_eq!(decode(&tio).flow_control, both);
        }
    }

    // A device left with any one of the three soft-flow input flags counts
    // as software flow control on read-back.
    #[test]
    fn test_any_soft_flow_bit_decodes_as_soft() {
        for bit in [libc::IXON, libc::IXOFF, libc::IXANY] {
            let mut tio = blank();
            tio.c_iflag |= bit;
            assert_eq!(decode(&tio).flow_control, FlowControl::SOFT, "{bit:#o}");
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut tio = blank();
        assert!(matches!(
            stage_update(&mut tio, &ParamsUpdate::new().data_bits(9)),
            Err(SerialError::InvalidParameter(_))
        ));
        assert!(matches!(
            stage_update(&mut tio, &ParamsUpdate::new().stop_bits(3)),
            Err(SerialError::InvalidParameter(_))
        ));
        assert!(matches!(
            stage_update(&mut tio, &ParamsUpdate::new().read_timeout(i32::MAX)),
            Err(SerialError::InvalidParameter(_))
        ));
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
    #[test]
    fn test_custom_rate_rides_on_b38400() {
        let mut tio = blank();
        let staged = stage_update(&mut tio, &ParamsUpdate::new().data_rate(250_000)).unwrap();
        assert_eq!(staged.custom_rate, Some(250_000));
        assert!(staged.rate_supplied);
        assert_eq!(unsafe { libc::cfgetospeed(&tio) }, libc::B38400);
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
    #[test]
    fn test_custom_rate_bounds() {
        let mut tio = blank();
        assert!(matches!(
            stage_update(&mut tio, &ParamsUpdate::new().data_rate(0)),
            Err(SerialError::InvalidParameter(_))
        ));
        assert!(matches!(
            stage_update(
                &mut tio,
                &ParamsUpdate::new().data_rate(CUSTOM_BAUD_CEILING + 1)
            ),
            Err(SerialError::InvalidParameter(_))
        ));
        assert!(stage_update(
            &mut tio,
            &ParamsUpdate::new().data_rate(CUSTOM_BAUD_CEILING)
        )
        .is_ok());
    }

    #[test]
    fn test_timeout_staging() {
        let mut tio = blank();
        stage_update(&mut tio, &ParamsUpdate::new().read_timeout(-1)).unwrap();
        assert_eq!(tio.c_cc[libc::VTIME], 0);
        assert_eq!(tio.c_cc[libc::VMIN], 0);
        assert_eq!(decode(&tio).read_timeout, -1);

        stage_update(&mut tio, &ParamsUpdate::new().read_timeout(0)).unwrap();
        assert_eq!(tio.c_cc[libc::VMIN], 1);
        assert_eq!(decode(&tio).read_timeout, 0);

        stage_update(&mut tio, &ParamsUpdate::new().read_timeout(450)).unwrap();
        assert_eq!(tio.c_cc[libc::VTIME], 5);
        assert_eq!(tio.c_cc[libc::VMIN], 0);
        assert_eq!(decode(&tio).read_timeout, 500);
    }
}
