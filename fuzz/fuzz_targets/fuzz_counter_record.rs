//! Fuzz target: restart counter record decoding
//!
//! Feeds arbitrary 8-byte store images to the record decoder.  Asserts
//! that it never panics, never yields the reserved value, and that an
//! advanced record always decodes to exactly one more from the primary.
//!
//! cargo fuzz run fuzz_counter_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use trvlink::security::record::{CopySlot, EXHAUSTED, PersistentRecord, RECORD_LEN};

fuzz_target!(|data: &[u8]| {
    let Ok(stored) = <[u8; RECORD_LEN]>::try_from(data) else {
        return;
    };
    let rec = PersistentRecord::from_stored(stored);
    let Ok(decoded) = rec.decode() else {
        return;
    };
    assert_ne!(decoded.value, EXHAUSTED);

    if let Ok(next) = rec.incremented() {
        let d = next.decode().expect("fresh record must decode");
        assert_eq!(d.slot, CopySlot::Primary);
        let before = u32::from_be_bytes([0, decoded.value[0], decoded.value[1], decoded.value[2]]);
        let after = u32::from_be_bytes([0, d.value[0], d.value[1], d.value[2]]);
        assert_eq!(after, before + 1);
        assert_eq!(next.stored().map(|b| !b), next.logical());
    }
});
