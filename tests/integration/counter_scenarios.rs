//! Integration tests: TX replay counter against simulated and faulty
//! EEPROM, across simulated reboots.

use trvlink::{CounterError, Error};
use trvlink::adapters::eeprom::{EepromWear, SimEeprom};
use trvlink::adapters::entropy::SeqEntropy;
use trvlink::app::ports::{NonVolatileStore, StorageError};
use trvlink::config::LinkConfig;
use trvlink::error::ConfigError;
use trvlink::security::record::CopySlot;
use trvlink::security::{CounterState, MessageCounter, PersistentRecord, TxCounter};

use super::mock_nv::{FaultyEeprom, NODE_ID, RECORD_ADDR, provisioned_eeprom};

fn record_bytes(ee: &SimEeprom) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&ee.as_bytes()[RECORD_ADDR..RECORD_ADDR + 8]);
    out
}

// ── Fresh device ──────────────────────────────────────────────

#[test]
fn fresh_device_first_value_and_record() {
    let mut ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(0x37));
    let first = ctr.next_counter().unwrap();

    // Reseed draws 37 38 39 (top byte folded to 04), the ephemeral seed
    // draws 3a 3b 3c (top byte folded to 09), then one increment.
    assert_eq!(
        first,
        MessageCounter::from_bytes([0x04, 0x38, 0x39, 0x09, 0x3B, 0x3D])
    );

    let expected = PersistentRecord::with_value([0x04, 0x38, 0x39]);
    assert_eq!(ctr.raw_record().unwrap(), expected.logical());
    assert_eq!(record_bytes(ctr.store()), expected.stored());
}

#[test]
fn first_iv_carries_node_id_prefix() {
    let mut ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(0x37));
    let iv = ctr.compute_iv().unwrap();
    assert_eq!(&iv[..6], &NODE_ID[..6]);
    assert_eq!(&iv[6..], &[0x04, 0x38, 0x39, 0x09, 0x3B, 0x3D]);
}

#[test]
fn values_never_repeat_across_reboots() {
    let mut store = provisioned_eeprom();
    let mut entropy = SeqEntropy::new(0xC0);
    let mut last: Option<MessageCounter> = None;

    for boot in 0..6 {
        let mut ctr = TxCounter::new(store, entropy);
        for _ in 0..(10 + boot * 7) {
            let v = ctr.next_counter().unwrap();
            if let Some(prev) = last {
                assert!(v > prev, "boot {}: {} not above {}", boot, v, prev);
            }
            last = Some(v);
        }
        (store, entropy) = ctr.into_inner();
    }
}

#[test]
fn reboot_advances_restart_counter_by_one() {
    let mut ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(0x37));
    let boot1 = ctr.next_counter().unwrap();
    let (store, entropy) = ctr.into_inner();

    let mut ctr = TxCounter::new(store, entropy);
    let boot2 = ctr.next_counter().unwrap();
    assert_eq!(boot2.persistent(), [0x04, 0x38, 0x3A]);
    assert!(boot2 > boot1);
    assert_eq!(ctr.stats().persistent_rolls, 1);
}

#[test]
fn ephemeral_path_never_writes() {
    let mut ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(0x37));
    ctr.next_counter().unwrap();
    let wear = ctr.store().wear();
    assert_ne!(wear, EepromWear::default());

    for _ in 0..1000 {
        ctr.next_counter().unwrap();
    }
    assert_eq!(ctr.store().wear(), wear);
    assert_eq!(ctr.stats().issued, 1001);
    assert_eq!(ctr.stats().persistent_rolls, 0);
}

// ── Corruption ────────────────────────────────────────────────

#[test]
fn corrupt_primary_falls_back_to_secondary_and_heals_on_write() {
    let mut ctr = TxCounter::new(provisioned_eeprom(), SeqEntropy::new(1));
    ctr.write_raw_record(&PersistentRecord::with_value([0, 0, 5]).logical())
        .unwrap();
    let (mut store, entropy) = ctr.into_inner();

    // Flip one bit of the primary copy's low byte.
    let b = store.read_byte(RECORD_ADDR + 2).unwrap();
    store.poke(RECORD_ADDR + 2, b ^ 0x10);

    let mut ctr = TxCounter::new(store, entropy);
    assert_eq!(ctr.persistent_part().unwrap(), [0, 0, 5]);

    let first = ctr.next_counter().unwrap();
    assert_eq!(first.persistent(), [0, 0, 6]);
    assert_eq!(ctr.stats().secondary_fallbacks, 1);

    // Both copies were rewritten by the advance.
    let rec = ctr.raw_record().unwrap();
    assert_eq!(rec[..4], rec[4..]);
}

#[test]
fn corrupt_secondary_is_rewritten_by_increment() {
    let mut store = provisioned_eeprom();
    let rec = PersistentRecord::with_value([0x00, 0x00, 0x01]).stored();
    store.load(RECORD_ADDR, &rec);
    store.poke(RECORD_ADDR + 6, rec[6] ^ 0x04);

    let mut ctr = TxCounter::new(store, SeqEntropy::new(1));
    assert_eq!(ctr.persistent_part().unwrap(), [0x00, 0x00, 0x01]);
    assert_eq!(ctr.increment_persistent_part().unwrap(), [0x00, 0x00, 0x02]);
    assert_eq!(ctr.stats().secondary_fallbacks, 0);

    let raw = ctr.raw_record().unwrap();
    assert_eq!(raw, [0x00, 0x00, 0x02, 0x0E, 0x00, 0x00, 0x02, 0x0E]);

    // Primary alone is enough once the secondary is damaged again.
    let mut primary_only = raw;
    primary_only[7] ^= 0xFF;
    let d = PersistentRecord::from_logical(primary_only).decode().unwrap();
    assert_eq!(d.value, [0x00, 0x00, 0x02]);
    assert_eq!(d.slot, CopySlot::Primary);
}

#[test]
fn both_copies_corrupt_refuses_without_writing() {
    let mut store = provisioned_eeprom();
    let rec = PersistentRecord::with_value([0, 0x40, 0x10]).stored();
    store.load(RECORD_ADDR, &rec);
    store.poke(RECORD_ADDR + 3, rec[3] ^ 0x01);
    store.poke(RECORD_ADDR + 7, rec[7] ^ 0x80);
    let before = record_bytes(&store);

    let mut ctr = TxCounter::new(store, SeqEntropy::new(1));
    assert_eq!(ctr.next_counter(), Err(CounterError::Corrupted));
    assert_eq!(ctr.state(), CounterState::Uninitialized);
    assert_eq!(ctr.current(), None);
    assert_eq!(ctr.stats().failures, 1);
    assert_eq!(record_bytes(ctr.store()), before);
}

// ── Exhaustion ────────────────────────────────────────────────

#[test]
fn exhausted_record_leaves_store_untouched() {
    let mut store = provisioned_eeprom();
    store.load(RECORD_ADDR, &PersistentRecord::with_value([0xFF, 0xFF, 0xFE]).stored());
    let before = store.wear();

    let mut ctr = TxCounter::new(store, SeqEntropy::new(1));
    assert_eq!(ctr.compute_iv(), Err(CounterError::Exhausted));
    assert_eq!(ctr.state(), CounterState::Exhausted);
    assert_eq!(ctr.store().wear(), before);
    assert_eq!(ctr.persistent_part().unwrap(), [0xFF, 0xFF, 0xFE]);
}

#[test]
fn increment_of_reserved_value_fails_without_writing() {
    let mut store = provisioned_eeprom();
    store.load(RECORD_ADDR, &PersistentRecord::with_value([0xFF; 3]).stored());
    let bytes = record_bytes(&store);
    let wear = store.wear();

    let mut ctr = TxCounter::new(store, SeqEntropy::new(1));
    assert_eq!(ctr.increment_persistent_part(), Err(CounterError::Exhausted));
    assert_eq!(ctr.state(), CounterState::Exhausted);
    assert_eq!(record_bytes(ctr.store()), bytes);
    assert_eq!(ctr.store().wear(), wear);
}

#[test]
fn reserved_value_in_both_copies_reads_as_exhausted() {
    let mut store = provisioned_eeprom();
    store.load(RECORD_ADDR, &PersistentRecord::with_value([0xFF; 3]).stored());
    let ctr = TxCounter::new(store, SeqEntropy::new(1));
    assert_eq!(ctr.persistent_part(), Err(CounterError::Exhausted));
}

#[test]
fn reset_recovers_from_exhaustion() {
    let mut store = provisioned_eeprom();
    store.load(RECORD_ADDR, &PersistentRecord::with_value([0xFF, 0xFF, 0xFE]).stored());
    let mut ctr = TxCounter::new(store, SeqEntropy::new(0x21));
    assert!(ctr.next_counter().is_err());

    ctr.reset_persistent_part(true).unwrap();
    assert_eq!(record_bytes(ctr.store()), [0xFF; 8]);
    let v = ctr.next_counter().unwrap();
    assert_ne!(v.persistent(), [0, 0, 0]);
    assert_eq!(ctr.state(), CounterState::Initialized);
}

// ── Failing hardware ──────────────────────────────────────────

#[test]
fn stuck_cell_is_reported_as_write_verify() {
    // Cell 105 always reads 00; reseeding wants to store !0x11 there.
    let store = FaultyEeprom::new(provisioned_eeprom()).with_stuck_cell(RECORD_ADDR + 1, 0x00);
    let mut ctr = TxCounter::new(store, SeqEntropy::new(0x10));
    assert_eq!(
        ctr.compute_iv(),
        Err(CounterError::WriteVerify { addr: RECORD_ADDR + 1 })
    );
    assert_eq!(ctr.current(), None);
    assert_eq!(ctr.stats().issued, 0);
}

#[test]
fn write_failure_propagates_and_nothing_is_issued() {
    let store = FaultyEeprom::new(provisioned_eeprom()).failing_after(2);
    let mut ctr = TxCounter::new(store, SeqEntropy::new(0x10));
    assert_eq!(
        ctr.next_counter(),
        Err(CounterError::Storage(StorageError::IoError))
    );
    assert_eq!(ctr.current(), None);
    assert_eq!(ctr.state(), CounterState::Uninitialized);

    // Once the part recovers, the next request succeeds.
    let (mut store, entropy) = ctr.into_inner();
    store.writes_left = None;
    let mut ctr = TxCounter::new(store, entropy);
    assert!(ctr.next_counter().is_ok());
}

#[test]
fn counter_works_through_borrowed_store() {
    let mut ee = provisioned_eeprom();
    let mut rng = SeqEntropy::new(0x44);
    {
        let mut ctr = TxCounter::new(&mut ee, &mut rng);
        ctr.next_counter().unwrap();
    }
    let p = PersistentRecord::from_stored(record_bytes(&ee)).decode().unwrap();
    assert_ne!(p.value, [0, 0, 0]);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn custom_layout_is_honoured() {
    let cfg = LinkConfig {
        node_id_addr: 200,
        counter_record_addr: 300,
        ..LinkConfig::default()
    };
    let mut ee = SimEeprom::new();
    ee.load(200, &NODE_ID);
    let mut ctr = TxCounter::with_config(ee, SeqEntropy::new(5), &cfg).unwrap();
    let iv = ctr.compute_iv().unwrap();
    assert_eq!(&iv[..6], &NODE_ID[..6]);
    assert!(ctr.store().as_bytes()[300..308].iter().any(|&b| b != 0xFF));
    assert!(ctr.store().as_bytes()[104..112].iter().all(|&b| b == 0xFF));
}

#[test]
fn record_past_end_of_store_is_rejected() {
    let cfg = LinkConfig {
        counter_record_addr: 1020,
        ..LinkConfig::default()
    };
    let r = TxCounter::with_config(SimEeprom::new(), SeqEntropy::new(5), &cfg);
    assert!(matches!(r, Err(Error::Config(ConfigError::ValidationFailed(_)))));
}
