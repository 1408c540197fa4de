//! Port traits — the hexagonal boundary between the link core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TxCounter / SecureLink (domain)
//! ```
//!
//! Driven adapters (EEPROM, hardware RNG, event sinks) implement these
//! traits.  The [`TxCounter`](crate::security::TxCounter) and
//! [`SecureLink`](super::service::SecureLink) consume them via generics,
//! so the domain core never touches hardware directly.
//!
//! ## Security notes
//!
//! - **NonVolatileStore** writes MUST be durable when the call returns;
//!   the replay counter relies on it to never reissue a nonce after a
//!   power cut.
//! - **EntropySource** MUST be cryptographically strong on hardware.
//!   Host simulation sources are for tests only.
//! - All port errors are typed; callers must handle every variant explicitly.

use super::events::LinkEvent;

// ───────────────────────────────────────────────────────────────
// Non-volatile store port (driven adapter: domain ↔ EEPROM / flash)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile memory with a blank value of `0xFF`.
///
/// Modelled on an EEPROM: each cell can be erased to `0xFF` and written
/// independently, and both operations wear the cell.  Implementations
/// should skip physical operations that would not change the cell.
pub trait NonVolatileStore {
    /// Size of the store in bytes.
    fn len(&self) -> usize;

    /// True if the store has no addressable bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one byte.
    fn read_byte(&self, addr: usize) -> Result<u8, StorageError>;

    /// Read `buf.len()` consecutive bytes starting at `addr`.
    fn read_block(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.read_byte(addr + i)?;
        }
        Ok(())
    }

    /// Durably set the byte at `addr` to `value`.
    ///
    /// Returns `Ok(false)` without touching the cell when it already holds
    /// `value`, `Ok(true)` when a physical write happened.
    fn update_byte_if_different(&mut self, addr: usize, value: u8) -> Result<bool, StorageError>;

    /// Durably erase the byte at `addr` to blank (`0xFF`).
    ///
    /// Returns `Ok(false)` without touching the cell when it is already
    /// blank.
    fn erase_byte_to_blank(&mut self, addr: usize) -> Result<bool, StorageError>;
}

impl<T: NonVolatileStore + ?Sized> NonVolatileStore for &mut T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StorageError> {
        (**self).read_byte(addr)
    }

    fn read_block(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_block(addr, buf)
    }

    fn update_byte_if_different(&mut self, addr: usize, value: u8) -> Result<bool, StorageError> {
        (**self).update_byte_if_different(addr, value)
    }

    fn erase_byte_to_blank(&mut self, addr: usize) -> Result<bool, StorageError> {
        (**self).erase_byte_to_blank(addr)
    }
}

// ───────────────────────────────────────────────────────────────
// Entropy port (driven adapter: hardware RNG → domain)
// ───────────────────────────────────────────────────────────────

/// Source of secure random bytes.
///
/// May be slow and must not be called with interrupts masked, so the
/// domain never calls it from inside a critical section.
pub trait EntropySource {
    fn secure_random_byte(&mut self) -> u8;
}

impl<T: EntropySource + ?Sized> EntropySource for &mut T {
    fn secure_random_byte(&mut self) -> u8 {
        (**self).secure_random_byte()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`LinkEvent`]s through this port.
/// Adapters decide where they go (serial log, stats line, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &LinkEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`NonVolatileStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Address lies outside the store.
    OutOfRange { addr: usize },
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`LinkConfig`](crate::config::LinkConfig) validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange { addr } => write!(f, "address {} out of range", addr),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
