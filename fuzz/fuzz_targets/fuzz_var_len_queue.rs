//! Fuzz target: `VarLenRxQueue` producer/consumer interleavings
//!
//! Each input byte is one operation: the low bit selects push or pop and
//! the rest gives the frame length (including oversized and zero-length
//! commits).  Asserts that frames come back in order and intact, and that
//! the queued count never drifts.
//!
//! cargo fuzz run fuzz_var_len_queue

#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use trvlink::rx::{RxQueue, VarLenRxQueue};

const MAX: usize = 12;

fuzz_target!(|data: &[u8]| {
    let mut q = VarLenRxQueue::<MAX, 50>::new();
    let (mut tx, mut rx) = q.split();
    let mut model: VecDeque<Vec<u8>> = VecDeque::new();

    for (i, &op) in data.iter().enumerate() {
        if op & 1 == 0 {
            let want = (op >> 1) as usize % (MAX + 3);
            let Some(mut slot) = tx.reserve() else {
                continue;
            };
            let fill = want.min(slot.len());
            slot[..fill].fill(i as u8);
            if slot.commit(want) {
                assert!(want >= 1 && want <= MAX, "accepted length {}", want);
                model.push_back(vec![i as u8; want]);
            }
        } else {
            let got = rx.peek_oldest().map(<[u8]>::to_vec);
            assert_eq!(got, model.pop_front());
            rx.remove_oldest();
        }
        assert_eq!(rx.queued_count() as usize, model.len());
    }
});
