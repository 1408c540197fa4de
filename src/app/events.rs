//! Outbound link events.
//!
//! The [`SecureLink`](super::service::SecureLink) service emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, count
//! them for a stats line, etc.

use crate::error::CounterError;
use crate::security::MessageCounter;

/// Structured events emitted by the link core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A frame was taken off the RX queue and handed to the application.
    FrameReceived { len: u8 },

    /// A fresh IV was issued for an outbound secure frame.
    IvIssued(MessageCounter),

    /// The TX counter refused to issue a value.
    CounterFailed(CounterError),

    /// The restart counter was reset, either to blank or to a random seed.
    CounterReset { to_zero: bool },
}
