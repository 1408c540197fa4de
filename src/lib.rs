//! TRV secure radio link core.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection: ISR-safe RX frame queues, the power-fail-safe TX replay
//! counter, and the service that ties them to the main loop.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod rx;
pub mod security;

pub use error::{CounterError, Error, Result};
