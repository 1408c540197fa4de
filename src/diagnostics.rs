//! Link diagnostics.
//!
//! A snapshot of the TX counter and RX queue, collected on demand and
//! rendered as a single JSON object for the stats line.  Counter values
//! are reported, never keys.

use serde::Serialize;

use crate::adapters::device_id::{DeviceIdString, device_label};
use crate::app::ports::{EntropySource, NonVolatileStore};
use crate::rx::{RxCapacity, RxConsumer, RxQueue};
use crate::security::{CounterState, CounterStats, TxCounter};

/// Runtime link snapshot collected on-demand.
#[derive(Debug, Clone, Serialize)]
pub struct LinkDiagnostics {
    pub device: Option<DeviceIdString>,
    pub counter_state: CounterState,
    pub counter: CounterStats,
    /// Last issued 48-bit message counter this boot.
    pub last_counter: Option<u64>,
    pub rx_capacity: RxCapacity,
    pub rx_queued: u8,
    pub rx_dropped: u16,
    pub rx_frames: u32,
}

impl LinkDiagnostics {
    pub fn collect<S, E, Q>(
        counter: &TxCounter<S, E>,
        rx: &RxConsumer<'_, Q>,
        rx_frames: u32,
    ) -> Self
    where
        S: NonVolatileStore,
        E: EntropySource,
        Q: RxQueue,
    {
        Self {
            device: counter.cached_device_id().map(|id| device_label(&id)),
            counter_state: counter.state(),
            counter: counter.stats(),
            last_counter: counter.current().map(|c| c.value()),
            rx_capacity: rx.capacity(),
            rx_queued: rx.queued_count(),
            rx_dropped: rx.dropped_frames(),
            rx_frames,
        }
    }

    /// One-line JSON rendering, e.g. for a `stats` command.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
