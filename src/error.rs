//! Unified error types for the TRV link core.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! firmware edge handles link failures uniformly. All variants are `Copy`
//! so they can be reported through events and diagnostics without
//! allocation.

use core::fmt;

pub use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level link error
// ---------------------------------------------------------------------------

/// Every fallible operation in the link core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The TX replay counter cannot safely produce a value.
    Counter(CounterError),
    /// The non-volatile store failed.
    Storage(StorageError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter(e) => write!(f, "counter: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Replay counter errors
// ---------------------------------------------------------------------------

/// Failures of the TX replay counter.
///
/// Every variant means no counter value (and so no IV) was issued; the
/// caller must not transmit an encrypted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterError {
    /// Neither copy of the restart counter passes its checksum.
    Corrupted,
    /// The restart counter has reached its maximum and cannot advance.
    Exhausted,
    /// A byte did not read back as written.
    WriteVerify { addr: usize },
    /// The node ID in non-volatile storage is unprogrammed or invalid.
    NoDeviceId,
    /// The non-volatile store reported a failure.
    Storage(StorageError),
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "restart counter corrupted"),
            Self::Exhausted => write!(f, "restart counter exhausted"),
            Self::WriteVerify { addr } => write!(f, "write verify failed at {addr}"),
            Self::NoDeviceId => write!(f, "node ID not programmed"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<StorageError> for CounterError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<CounterError> for Error {
    fn from(e: CounterError) -> Self {
        Self::Counter(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
