//! Application core — link logic behind port traits, zero direct I/O.
//!
//! This module wires the RX frame queue, the TX replay counter and event
//! reporting together.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
