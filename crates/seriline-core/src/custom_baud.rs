//! Custom baud rate side channels
//!
//! POSIX termios only enumerates a fixed set of standard speeds; arbitrary
//! rates need a platform side channel layered on top of the regular
//! attribute commit. Linux drives the UART driver's clock divisor through
//! `TIOCGSERIAL`/`TIOCSSERIAL`, so the active custom rate is recoverable
//! from kernel state. Darwin takes the literal speed via `IOSSIOSPEED` but
//! offers no read-back path, so the session caches the requested rate.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod divisor {
    use std::io;
    use std::mem;
    use std::os::unix::io::RawFd;

    use crate::error::SerialError;
    use crate::termios::retry_eintr;

    const TIOCGSERIAL: libc::c_ulong = 0x541E;
    const TIOCSSERIAL: libc::c_ulong = 0x541F;

    const ASYNC_SPD_MASK: libc::c_int = 0x1030;
    const ASYNC_SPD_CUST: libc::c_int = 0x0030;

    /// Mirror of `struct serial_struct` from `<linux/serial.h>`.
    #[repr(C)]
    #[derive(Clone, Copy)]
    struct SerialInfo {
        type_: libc::c_int,
        line: libc::c_int,
        port: libc::c_uint,
        irq: libc::c_int,
        flags: libc::c_int,
        xmit_fifo_size: libc::c_int,
        custom_divisor: libc::c_int,
        baud_base: libc::c_int,
        close_delay: libc::c_ushort,
        io_type: libc::c_char,
        reserved_char: [libc::c_char; 1],
        hub6: libc::c_int,
        closing_wait: libc::c_ushort,
        closing_wait2: libc::c_ushort,
        iomem_base: *mut libc::c_uchar,
        iomem_reg_shift: libc::c_ushort,
        port_high: libc::c_uint,
        iomap_base: libc::c_ulong,
    }

    fn get_info(fd: RawFd) -> io::Result<SerialInfo> {
        let mut info: SerialInfo = unsafe { mem::zeroed() };
        // request type is c_int on bionic, c_ulong on glibc
        retry_eintr(|| unsafe { libc::ioctl(fd, TIOCGSERIAL as _, &mut info) })?;
        Ok(info)
    }

    fn set_info(fd: RawFd, info: &SerialInfo) -> io::Result<()> {
        retry_eintr(|| unsafe { libc::ioctl(fd, TIOCSSERIAL as _, info) })?;
        Ok(())
    }

    /// Computes the driver divisor for a requested rate.
    ///
    /// Integer truncation means rates that do not evenly divide the base
    /// clock round to `baud_base / divisor`; exact round-trip holds only
    /// when `baud_base % rate == 0`.
    pub(crate) fn divisor_for(baud_base: libc::c_int, rate: u32) -> Result<libc::c_int, SerialError> {
        if rate == 0 {
            return Err(SerialError::CustomBaudRejected(
                "rate must be positive".into(),
            ));
        }
        if baud_base <= 0 || i64::from(rate) > i64::from(baud_base) {
            return Err(SerialError::CustomBaudRejected(format!(
                "rate {rate} exceeds the base clock {baud_base}"
            )));
        }
        Ok(baud_base / rate as libc::c_int)
    }

    /// Activates a custom rate by writing the divisor back with the
    /// custom-speed flag set.
    pub(crate) fn set(fd: RawFd, rate: u32) -> Result<(), SerialError> {
        let mut info = get_info(fd).map_err(SerialError::CustomBaudUnsupported)?;
        info.custom_divisor = divisor_for(info.baud_base, rate)?;
        info.flags = (info.flags & !ASYNC_SPD_MASK) | ASYNC_SPD_CUST;
        set_info(fd, &info).map_err(SerialError::CustomBaudUnsupported)
    }

    /// Deactivates any custom rate. Idempotent: already-clear state and
    /// drivers without the side channel are both no-op successes.
    pub(crate) fn clear(fd: RawFd) -> Result<(), SerialError> {
        let mut info = match get_info(fd) {
            Ok(info) => info,
            Err(err) if matches!(err.raw_os_error(), Some(libc::ENOTTY) | Some(libc::EINVAL)) => {
                return Ok(());
            }
            Err(err) => return Err(SerialError::CustomBaudUnsupported(err)),
        };
        if info.flags & ASYNC_SPD_CUST == 0 && info.custom_divisor == 0 {
            return Ok(());
        }
        info.flags &= !ASYNC_SPD_CUST;
        info.custom_divisor = 0;
        set_info(fd, &info).map_err(SerialError::CustomBaudUnsupported)
    }

    /// Currently active custom rate, or 0 when none is set.
    pub(crate) fn get(fd: RawFd) -> u32 {
        match get_info(fd) {
            Ok(info)
                if info.flags & ASYNC_SPD_CUST != 0
                    && info.custom_divisor > 0
                    && info.baud_base > 0 =>
            {
                (info.baud_base / info.custom_divisor) as u32
            }
            _ => 0,
        }
    }

    #[cfg(test)]
    mod tests {
        use pretty_assertions::assert_eq;

        use super::*;

        #[test]
        fn test_divisor_exact_division() {
            assert_eq!(divisor_for(24_000_000, 250_000).unwrap(), 96);
            assert_eq!(divisor_for(115_200, 115_200).unwrap(), 1);
        }

        #[test]
        fn test_divisor_truncates() {
            // 24_000_000 / 7_000_000 = 3 (actual rate 8_000_000)
            assert_eq!(divisor_for(24_000_000, 7_000_000).unwrap(), 3);
        }

        #[test]
        fn test_divisor_rejects_above_base_clock() {
            assert!(matches!(
                divisor_for(115_200, 230_400),
                Err(SerialError::CustomBaudRejected(_))
            ));
        }

        #[test]
        fn test_divisor_rejects_degenerate_inputs() {
            assert!(matches!(
                divisor_for(24_000_000, 0),
                Err(SerialError::CustomBaudRejected(_))
            ));
            assert!(matches!(
                divisor_for(0, 9600),
                Err(SerialError::CustomBaudRejected(_))
            ));
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use divisor::{clear, get, set};

#[cfg(target_os = "macos")]
mod direct {
    use std::os::unix::io::RawFd;

    use crate::error::SerialError;
    use crate::termios::retry_eintr;

    // _IOW('T', 2, speed_t) from <IOKit/serial/ioss.h>
    const IOSSIOSPEED: libc::c_ulong = 0x8008_5402;

    /// Hands the literal speed to the driver. The kernel keeps no
    /// queryable record of it; the caller caches the rate on the session.
    pub(crate) fn set(fd: RawFd, rate: u32) -> Result<(), SerialError> {
        let speed = rate as libc::speed_t;
        retry_eintr(|| unsafe { libc::ioctl(fd, IOSSIOSPEED, &speed) })
            .map_err(SerialError::CustomBaudUnsupported)?;
        Ok(())
    }
}

#[cfg(target_os = "macos")]
pub(crate) use direct::set;
