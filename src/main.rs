//! TRVLink Firmware — Main Entry Point
//!
//! Brings up the secure radio link on an ESP32 TRV node.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsEeprom          SystemEntropy     LogEventSink             │
//! │  (NonVolatileStore) (EntropySource)   (EventSink)              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              SecureLink (pure logic)                   │    │
//! │  │  RX queue consumer · TxCounter · diagnostics           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Radio driver ISR ──▶ RxProducer (owned by the radio driver)   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use trvlink::adapters::device_id::{device_label, ensure_node_id, node_id_hex};
use trvlink::adapters::eeprom::{NvsEeprom, log_wear};
use trvlink::adapters::entropy::SystemEntropy;
use trvlink::adapters::log_sink::LogEventSink;
use trvlink::app::service::SecureLink;
use trvlink::config::LinkConfig;
use trvlink::rx::{RxQueue, VarLenRxQueue, trim_trailing_zeros};
use trvlink::security::TxCounter;

/// Largest radio frame accepted (FS20/OOK and secure frames fit).
const RX_MAX_FRAME: usize = 64;
/// RX ring size; a little over three full-size frames.
const RX_RING_BYTES: usize = 200;

/// Interval between stats lines.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  TRVLink v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Non-volatile store and identity ────────────────────
    let config = LinkConfig::default();
    let partition = EspDefaultNvsPartition::take().context("NVS partition")?;
    let mut eeprom = NvsEeprom::new(partition)
        .map_err(trvlink::Error::from)
        .context("EEPROM init")?;
    let mut entropy = SystemEntropy::new();

    let node_id = ensure_node_id(&mut eeprom, &mut entropy, config.node_id_addr as usize, false)
        .map_err(trvlink::Error::from)
        .context("node ID")?;
    info!("Node ID: {}", node_id_hex(&node_id));

    let counter = TxCounter::with_config(eeprom, entropy, &config)?;

    // ── 3. RX queue ───────────────────────────────────────────
    let mut rx_queue = VarLenRxQueue::<RX_MAX_FRAME, RX_RING_BYTES>::new();
    let (mut rx_producer, rx_consumer) = rx_queue.split();
    if config.trim_rx_trailing_zeros {
        rx_producer.set_filter(Some(trim_trailing_zeros));
    }

    let mut link = SecureLink::new(counter, rx_consumer, &config);
    let mut sink = LogEventSink::new();

    // ── 4. Boot self-test: loop one frame through the RX path ─
    let selftest = b"TRV-SELFTEST";
    let queued = rx_producer.receive_with(|slot| {
        slot[..selftest.len()].copy_from_slice(selftest);
        selftest.len()
    });
    let mut echoed = false;
    link.poll_rx(&mut sink, |frame| echoed = frame == selftest);
    if !(queued && echoed) {
        warn!("RX self-test failed (queued={}, echoed={})", queued, echoed);
    }
    // No radio driver in this build; nothing else queues frames.
    drop(rx_producer);

    // ── 5. First IV: advances the restart counter for this boot ─
    match link.next_tx_iv(&mut sink) {
        Ok(_) => {
            if let Some(id) = link.counter().cached_device_id() {
                info!("Device ID: {}", device_label(&id));
            }
        }
        Err(e) => error!("TX counter unusable, secure TX disabled: {}", e),
    }

    // ── 6. Main loop ──────────────────────────────────────────
    loop {
        link.poll_rx(&mut sink, |frame| {
            info!("RX frame {}B", frame.len());
        });

        let diag = link.diagnostics();
        match diag.to_json() {
            Ok(json) => info!("STATS {}", json),
            Err(e) => warn!("stats render failed: {}", e),
        }
        log_wear("NvsEeprom", link.counter().store().wear());

        std::thread::sleep(STATS_INTERVAL);
    }
}
