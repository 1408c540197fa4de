//! Replay protection for outbound secure frames.
//!
//! - [`record`] — the checksummed, duplicated restart counter record
//! - [`counter`] — [`TxCounter`], the persistent + ephemeral message
//!   counter and IV generator
//! - [`crc`] — CRC-8/CCITT used by the record

pub mod counter;
pub mod crc;
pub mod record;

pub use counter::{CounterState, CounterStats, DeviceId, Iv, MessageCounter, TxCounter, IV_LEN};
pub use record::{PersistentRecord, RestartCounter};
