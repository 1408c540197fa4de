//! RX frame filters and log formatting.

use core::fmt;

/// Fast filter run in the RX path before a frame is committed.
///
/// Sees the received bytes and may shorten `len`; returns `false` to drop
/// the frame early, saving queue space on a busy channel.  Must be quick
/// enough for interrupt context.
pub type QuickFrameFilter = fn(frame: &[u8], len: &mut usize) -> bool;

/// Trim all but the first of any trailing zero bytes.
///
/// OOK radios often pad the frame buffer with zeros; trimming them fits
/// more frames into a variable-length queue.  One trailing zero is kept
/// for frame types that legitimately end in one.  Never rejects.
pub fn trim_trailing_zeros(frame: &[u8], len: &mut usize) -> bool {
    let n = (*len).min(frame.len());
    if n <= 1 || frame[n - 1] != 0 {
        return true;
    }
    *len = match frame[..n].iter().rposition(|&b| b != 0) {
        Some(last) => last + 2,
        None => 1,
    };
    true
}

/// Human- and machine-readable one-line dump of a frame.
///
/// `|<len> ` followed by two characters per byte: printable ASCII as a
/// space and the character, anything else as two hex digits.
pub struct FrameDump<'a>(pub &'a [u8]);

impl fmt::Display for FrameDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|{} ", self.0.len())?;
        for &b in self.0 {
            if (32..126).contains(&b) {
                write!(f, " {}", b as char)?;
            } else {
                write!(f, "{:02X}", b)?;
            }
        }
        Ok(())
    }
}
