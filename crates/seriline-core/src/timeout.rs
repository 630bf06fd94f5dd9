//! Millisecond read timeouts mapped onto the POSIX VTIME/VMIN fields
//!
//! The encoding mirrors the termios blocking-read model:
//!
//! - negative: `(VTIME=0, VMIN=0)`, the read returns only once the caller's
//!   buffer request is satisfied (pure blocking)
//! - zero: `(VTIME=0, VMIN=1)`, wait indefinitely for the first byte, then
//!   return whatever is available
//! - positive: `(VTIME=(ms+50)/100, VMIN=0)`, wait up to the rounded
//!   timeout for the first byte with no inter-character timer
//!
//! The first two are distinct blocking behaviors and are deliberately not
//! collapsed. VTIME has a 100 ms granularity, so positive values round to
//! the nearest 100 ms via `(ms + 50) / 100`.

use crate::error::SerialError;

/// Largest timeout representable after rounding into the one-byte VTIME
/// field.
const MAX_TIMEOUT_MS: i32 = libc::cc_t::MAX as i32 * 100;

/// Maps a millisecond timeout to `(VTIME, VMIN)`.
pub(crate) fn encode(ms: i32) -> Result<(libc::cc_t, libc::cc_t), SerialError> {
    if ms < 0 {
        Ok((0, 0))
    } else if ms == 0 {
        Ok((0, 1))
    } else {
        // checked: ms near i32::MAX must reject, not wrap
        match ms.checked_add(50).map(|sum| sum / 100) {
            Some(units) if units <= libc::cc_t::MAX as i32 => Ok((units as libc::cc_t, 0)),
            _ => Err(SerialError::InvalidParameter(format!(
                "read timeout {ms} ms exceeds the {MAX_TIMEOUT_MS} ms maximum"
            ))),
        }
    }
}

/// Maps `(VTIME, VMIN)` back to the millisecond encoding; the inverse of
/// [`encode`] up to 100 ms rounding.
pub(crate) fn decode(vtime: libc::cc_t, vmin: libc::cc_t) -> i32 {
    if vtime == 0 && vmin == 0 {
        -1
    } else {
        i32::from(vtime) * 100
    }
}
