//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured link events to the
//! logger (UART / USB-CDC on target, stderr on the host).

use log::{error, info, warn};

use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LinkEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::FrameReceived { len } => {
                info!("RX    | frame len={}", len);
            }
            LinkEvent::IvIssued(ctr) => {
                info!("TX    | iv counter={}", ctr);
            }
            LinkEvent::CounterFailed(e) => {
                error!("TXCTR | refused: {}", e);
            }
            LinkEvent::CounterReset { to_zero } => {
                warn!(
                    "TXCTR | restart counter reset ({})",
                    if *to_zero { "blank" } else { "reseeded" }
                );
            }
        }
    }
}
