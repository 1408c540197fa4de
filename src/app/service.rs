//! Link service — the hexagonal core.
//!
//! [`SecureLink`] owns the TX replay counter and the consumer end of the
//! RX queue.  It exposes a hardware-agnostic API for the main loop; event
//! sinks are injected at call sites, making the whole service testable
//! with mock adapters.
//!
//! ```text
//!  RxConsumer ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                 │       SecureLink       │
//!  TxCounter  ◀──▶│  RX drain · IV issue   │
//!                 └────────────────────────┘
//! ```

use log::{debug, info};

use crate::config::LinkConfig;
use crate::diagnostics::LinkDiagnostics;
use crate::error::CounterError;
use crate::rx::{FrameDump, RxConsumer, RxQueue};
use crate::security::{Iv, TxCounter};

use super::events::LinkEvent;
use super::ports::{EntropySource, EventSink, NonVolatileStore};

// ───────────────────────────────────────────────────────────────
// SecureLink
// ───────────────────────────────────────────────────────────────

/// Main-loop side of the secure radio link.
pub struct SecureLink<'q, S, E, Q: RxQueue> {
    counter: TxCounter<S, E>,
    rx: RxConsumer<'q, Q>,
    dump_rx: bool,
    frames_received: u32,
}

impl<'q, S, E, Q> SecureLink<'q, S, E, Q>
where
    S: NonVolatileStore,
    E: EntropySource,
    Q: RxQueue,
{
    pub fn new(counter: TxCounter<S, E>, rx: RxConsumer<'q, Q>, config: &LinkConfig) -> Self {
        info!(
            "SecureLink: rx capacity {} x {}B",
            rx.capacity().min_queued_frames,
            rx.capacity().max_frame_len
        );
        Self {
            counter,
            rx,
            dump_rx: config.dump_rx_frames,
            frames_received: 0,
        }
    }

    pub fn counter(&self) -> &TxCounter<S, E> {
        &self.counter
    }

    pub fn counter_mut(&mut self) -> &mut TxCounter<S, E> {
        &mut self.counter
    }

    /// Hand back the counter, e.g. to simulate a reboot in tests.
    pub fn into_counter(self) -> TxCounter<S, E> {
        self.counter
    }

    // ── TX ────────────────────────────────────────────────────

    /// IV for the next outbound secure frame.
    ///
    /// On error nothing may be transmitted with encryption.
    pub fn next_tx_iv(&mut self, sink: &mut impl EventSink) -> Result<Iv, CounterError> {
        match self.counter.compute_iv() {
            Ok(iv) => {
                if let Some(ctr) = self.counter.current() {
                    sink.emit(&LinkEvent::IvIssued(ctr));
                }
                Ok(iv)
            }
            Err(e) => {
                sink.emit(&LinkEvent::CounterFailed(e));
                Err(e)
            }
        }
    }

    /// Reset the restart counter for a new key.
    pub fn rekey(&mut self, all_zeros: bool, sink: &mut impl EventSink) -> Result<(), CounterError> {
        self.counter
            .reset_persistent_part(all_zeros)
            .inspect_err(|e| sink.emit(&LinkEvent::CounterFailed(*e)))?;
        sink.emit(&LinkEvent::CounterReset { to_zero: all_zeros });
        Ok(())
    }

    // ── RX ────────────────────────────────────────────────────

    /// Hand every frame queued at entry to `handler`, oldest first,
    /// removing each afterwards.  Returns the number handled.
    ///
    /// Frames the ISR queues meanwhile wait for the next poll, which keeps
    /// one call bounded.
    pub fn poll_rx(&mut self, sink: &mut impl EventSink, mut handler: impl FnMut(&[u8])) -> usize {
        let pending = self.rx.queued_count() as usize;
        let mut handled = 0;
        while handled < pending {
            let Some(frame) = self.rx.peek_oldest() else {
                break;
            };
            let len = frame.len() as u8;
            if self.dump_rx {
                debug!("rx: {}", FrameDump(frame));
            }
            handler(frame);
            self.rx.remove_oldest();
            sink.emit(&LinkEvent::FrameReceived { len });
            handled += 1;
        }
        self.frames_received = self.frames_received.wrapping_add(handled as u32);
        handled
    }

    // ── Diagnostics ───────────────────────────────────────────

    pub fn diagnostics(&self) -> LinkDiagnostics {
        LinkDiagnostics::collect(&self.counter, &self.rx, self.frames_received)
    }
}
