//! CRC-8/CCITT over the restart counter bytes.
//!
//! Polynomial `0x07`, initial value 0, no reflection, no final xor.  The
//! catalogue names this CRC-8/SMBUS.  Zero bytes from a zero initial value
//! checksum to zero, which is what lets a blank (inverted) record read as a
//! valid zero counter.

use crc::{CRC_8_SMBUS, Crc};

const CRC8_CCITT: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Checksum `data` with CRC-8/CCITT.
pub fn crc8_ccitt(data: &[u8]) -> u8 {
    CRC8_CCITT.checksum(data)
}
