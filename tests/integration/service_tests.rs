//! Integration tests: SecureLink → counter + RX queue → event sink.

use trvlink::CounterError;
use trvlink::adapters::eeprom::SimEeprom;
use trvlink::adapters::entropy::SeqEntropy;
use trvlink::app::events::LinkEvent;
use trvlink::app::service::SecureLink;
use trvlink::config::LinkConfig;
use trvlink::rx::{RxProducer, RxQueue, VarLenRxQueue};
use trvlink::security::{CounterState, TxCounter};

use super::mock_nv::{NODE_ID, RecordingSink, provisioned_eeprom};

fn push<Q: RxQueue>(tx: &mut RxProducer<'_, Q>, frame: &[u8]) -> bool {
    tx.receive_with(|slot| {
        slot[..frame.len()].copy_from_slice(frame);
        frame.len()
    })
}

#[test]
fn poll_rx_hands_frames_over_in_order() {
    let mut q = VarLenRxQueue::<16, 64>::new();
    let (mut tx, rx) = q.split();
    let ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(1));
    let mut link = SecureLink::new(ctr, rx, &LinkConfig::default());
    let mut sink = RecordingSink::new();

    assert!(push(&mut tx, b"ab"));
    assert!(push(&mut tx, b"cde"));

    let mut seen: Vec<Vec<u8>> = Vec::new();
    let n = link.poll_rx(&mut sink, |f| seen.push(f.to_vec()));
    assert_eq!(n, 2);
    assert_eq!(seen, vec![b"ab".to_vec(), b"cde".to_vec()]);
    assert_eq!(
        sink.events,
        vec![
            LinkEvent::FrameReceived { len: 2 },
            LinkEvent::FrameReceived { len: 3 },
        ]
    );
    assert_eq!(link.poll_rx(&mut sink, |_| {}), 0);
    assert_eq!(link.diagnostics().rx_frames, 2);
}

#[test]
fn poll_rx_leaves_late_arrivals_for_next_poll() {
    let mut q = VarLenRxQueue::<8, 64>::new();
    let (mut tx, rx) = q.split();
    let ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(1));
    let mut link = SecureLink::new(ctr, rx, &LinkConfig::default());
    let mut sink = RecordingSink::new();

    assert!(push(&mut tx, &[1]));
    // Every handled frame triggers another arrival, as a busy ISR would.
    let n = link.poll_rx(&mut sink, |_| {
        push(&mut tx, &[2]);
    });
    assert_eq!(n, 1);
    assert_eq!(link.diagnostics().rx_queued, 1);
}

#[test]
fn next_tx_iv_reports_issued_counter() {
    let mut q = VarLenRxQueue::<8, 32>::new();
    let (_tx, rx) = q.split();
    let ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(1));
    let mut link = SecureLink::new(ctr, rx, &LinkConfig::default());
    let mut sink = RecordingSink::new();

    let iv1 = link.next_tx_iv(&mut sink).unwrap();
    let iv2 = link.next_tx_iv(&mut sink).unwrap();
    assert_eq!(&iv1[..6], &NODE_ID[..6]);
    assert!(iv2[6..] > iv1[6..]);

    let issued: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            LinkEvent::IvIssued(c) => Some(*c.as_bytes()),
            _ => None,
        })
        .collect();
    assert_eq!(issued.len(), 2);
    assert_eq!(&issued[1][..], &iv2[6..]);
}

#[test]
fn missing_node_id_is_reported_and_refused() {
    let mut q = VarLenRxQueue::<8, 32>::new();
    let (_tx, rx) = q.split();
    let ctr = TxCounter::new(SimEeprom::new(), SeqEntropy::new(1));
    let mut link = SecureLink::new(ctr, rx, &LinkConfig::default());
    let mut sink = RecordingSink::new();

    assert_eq!(link.next_tx_iv(&mut sink), Err(CounterError::NoDeviceId));
    assert_eq!(
        sink.events,
        vec![LinkEvent::CounterFailed(CounterError::NoDeviceId)]
    );
}

#[test]
fn rekey_restarts_counter_life() {
    let mut q = VarLenRxQueue::<8, 32>::new();
    let (_tx, rx) = q.split();
    let ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(0x50));
    let mut link = SecureLink::new(ctr, rx, &LinkConfig::default());
    let mut sink = RecordingSink::new();

    link.next_tx_iv(&mut sink).unwrap();
    link.rekey(false, &mut sink).unwrap();
    assert_eq!(link.counter().state(), CounterState::Uninitialized);
    assert!(sink.events.contains(&LinkEvent::CounterReset { to_zero: false }));

    link.next_tx_iv(&mut sink).unwrap();
    assert_eq!(link.counter().state(), CounterState::Initialized);
    assert_eq!(
        sink.count(|e| matches!(e, LinkEvent::IvIssued(_))),
        2
    );
}

#[test]
fn diagnostics_snapshot_serialises() {
    let mut q = VarLenRxQueue::<8, 32>::new();
    let (mut tx, rx) = q.split();
    let ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(1));
    let mut link = SecureLink::new(ctr, rx, &LinkConfig::default());
    let mut sink = RecordingSink::new();

    link.next_tx_iv(&mut sink).unwrap();
    assert!(push(&mut tx, &[1, 2, 3]));

    let d = link.diagnostics();
    assert_eq!(d.rx_queued, 1);
    assert_eq!(d.counter.issued, 1);
    assert_eq!(d.device.as_deref(), Some("TRV-B4C5D6"));

    let json = d.to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["rx_capacity"]["max_frame_len"], 8);
    assert_eq!(v["counter_state"], "Initialized");
}
