//! Two-copy restart counter record as laid out in non-volatile storage.
//!
//! ```text
//!   base+0  base+1  base+2  base+3 | base+4  base+5  base+6  base+7
//!   c0      c1      c2      crc    | c0      c1      c2      crc
//!   ───────── primary ─────────────┴──────── secondary ───────────
//! ```
//!
//! Every byte is stored bit-inverted, so a blank store (all `0xFF`) reads
//! as counter 0 with a matching CRC of 0.  Everything here is pure: the
//! counter manager reads and writes the bytes, this module interprets them.

use crate::error::CounterError;

use super::crc::crc8_ccitt;

/// Bytes in the restart counter (the persistent, most significant part).
pub const COUNTER_BYTES: usize = 3;
/// Bytes in one checksummed copy.
pub const COPY_LEN: usize = COUNTER_BYTES + 1;
/// Bytes in the whole record (primary + secondary).
pub const RECORD_LEN: usize = 2 * COPY_LEN;

/// The 3-byte restart counter, most significant byte first.
pub type RestartCounter = [u8; COUNTER_BYTES];

/// Reserved value: never valid, marks an exhausted or unprogrammed counter.
pub const EXHAUSTED: RestartCounter = [0xFF; COUNTER_BYTES];

/// Which copy a value was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySlot {
    Primary,
    Secondary,
}

/// A validated restart counter and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCounter {
    pub value: RestartCounter,
    pub slot: CopySlot,
}

/// Logical (de-inverted) contents of the 8-byte record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentRecord([u8; RECORD_LEN]);

impl PersistentRecord {
    /// Wrap logical bytes, as seen after inversion.
    pub const fn from_logical(bytes: [u8; RECORD_LEN]) -> Self {
        Self(bytes)
    }

    /// Wrap bytes exactly as read from the store.
    pub fn from_stored(stored: [u8; RECORD_LEN]) -> Self {
        Self(stored.map(|b| !b))
    }

    /// Record holding `value` in both copies with a fresh CRC.
    pub fn with_value(value: RestartCounter) -> Self {
        let crc = crc8_ccitt(&value);
        let [c0, c1, c2] = value;
        Self([c0, c1, c2, crc, c0, c1, c2, crc])
    }

    pub fn logical(&self) -> [u8; RECORD_LEN] {
        self.0
    }

    /// Bytes as they must be written to the store.
    pub fn stored(&self) -> [u8; RECORD_LEN] {
        self.0.map(|b| !b)
    }

    fn copy(&self, slot: CopySlot) -> [u8; COPY_LEN] {
        let start = match slot {
            CopySlot::Primary => 0,
            CopySlot::Secondary => COPY_LEN,
        };
        let mut out = [0u8; COPY_LEN];
        out.copy_from_slice(&self.0[start..start + COPY_LEN]);
        out
    }

    /// Value of one copy if its CRC matches, whatever the value.
    fn checked_copy(&self, slot: CopySlot) -> Option<RestartCounter> {
        let [c0, c1, c2, crc] = self.copy(slot);
        let value = [c0, c1, c2];
        (crc8_ccitt(&value) == crc).then_some(value)
    }

    /// Recover the counter: primary first, then secondary.
    ///
    /// A copy is usable only if its CRC matches and it does not hold the
    /// reserved [`EXHAUSTED`] value.  A bad copy is not repaired here.
    pub fn decode(&self) -> Result<DecodedCounter, CounterError> {
        let mut saw_exhausted = false;
        for slot in [CopySlot::Primary, CopySlot::Secondary] {
            match self.checked_copy(slot) {
                Some(EXHAUSTED) => saw_exhausted = true,
                Some(value) => return Ok(DecodedCounter { value, slot }),
                None => {}
            }
        }
        Err(if saw_exhausted {
            CounterError::Exhausted
        } else {
            CounterError::Corrupted
        })
    }

    /// Record with the counter advanced by one, both copies rewritten.
    ///
    /// Refuses to reach the reserved value, so a counter at `FF FF FE`
    /// is exhausted.
    pub fn incremented(&self) -> Result<Self, CounterError> {
        let current = self.decode()?.value;
        increment(current)
            .map(Self::with_value)
            .ok_or(CounterError::Exhausted)
    }
}

/// Big-endian increment that refuses to produce [`EXHAUSTED`].
pub fn increment(value: RestartCounter) -> Option<RestartCounter> {
    let n = u32::from_be_bytes([0, value[0], value[1], value[2]]) + 1;
    if n >= 0x00FF_FFFF {
        return None;
    }
    let [_, b0, b1, b2] = n.to_be_bytes();
    Some([b0, b1, b2])
}

pub fn is_zero(value: &RestartCounter) -> bool {
    value.iter().all(|&b| b == 0)
}
