//! Circular RX queue of variable-length frames.
//!
//! Frames are packed into a byte ring as `[len][payload..len]` records.
//! Every record reserves `MAX + 1` contiguous bytes when it is started, so
//! the producer can hand out a full-size slot before knowing the frame
//! length; on commit only `len + 1` bytes are kept.
//!
//! ```text
//!   0                    oldest              next            BUF
//!   ├────────────────────┼───────────────────┼───────────────┤
//!   │        free        │ L|payload L|pay.. │      free     │
//!   └────────────────────┴───────────────────┴───────────────┘
//! ```
//!
//! When fewer than `MAX + 1` bytes remain before the physical end, the
//! record is placed at offset 0 and a zero length byte is left at the old
//! position as a wrap marker.  A record that ends exactly at `BUF` wraps
//! without a marker.  A stored length is never zero, so the marker is
//! unambiguous.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use super::{RxCapacity, RxQueue};

const WRAP_MARKER: u8 = 0;

pub struct VarLenRxQueue<const MAX: usize, const BUF: usize> {
    /// Start of the next record to write.  Producer only.
    next: AtomicU8,
    /// Start of the oldest record or of the wrap marker before it.
    /// Consumer only.
    oldest: AtomicU8,
    /// Records queued.  Producer increments, consumer decrements; the only
    /// field both sides write.
    count: AtomicU8,
    /// Frames lost to a full ring or an oversized commit.  Producer only.
    dropped: AtomicU16,
    buf: UnsafeCell<[u8; BUF]>,
}

// SAFETY: the producer only writes bytes in the span it reserved, which
// never overlaps a queued record; the consumer only reads bytes of queued
// records.  Index ownership is split as documented on the fields and
// `count` publishes each side's writes with release/acquire ordering.
unsafe impl<const MAX: usize, const BUF: usize> Sync for VarLenRxQueue<MAX, BUF> {}

impl<const MAX: usize, const BUF: usize> VarLenRxQueue<MAX, BUF> {
    const RECORD: usize = MAX + 1;

    const LAYOUT_OK: () = assert!(
        MAX != 0 && BUF <= 256 && BUF >= 2 * (MAX + 1),
        "need 1 <= MAX, BUF <= 256 and room for two full-size records"
    );

    pub const fn new() -> Self {
        let () = Self::LAYOUT_OK;
        Self {
            next: AtomicU8::new(0),
            oldest: AtomicU8::new(0),
            count: AtomicU8::new(0),
            dropped: AtomicU16::new(0),
            buf: UnsafeCell::new([0; BUF]),
        }
    }

    /// Pointer to byte `i` of the ring, without creating a reference to
    /// the whole array.
    fn byte_ptr(&self, i: usize) -> *mut u8 {
        debug_assert!(i < BUF);
        self.buf.get().cast::<u8>().wrapping_add(i)
    }

    fn wrap_index(i: usize) -> u8 {
        if i == BUF { 0 } else { i as u8 }
    }

    /// Where a new record would start, or `None` if it would not fit.
    fn placement(&self) -> Option<usize> {
        // Count first: a stale count is only ever too high, which errs
        // towards reporting full.
        let count = self.count.load(Ordering::Acquire);
        let oldest = self.oldest.load(Ordering::Acquire) as usize;
        let next = self.next.load(Ordering::Relaxed) as usize;

        if next < oldest {
            return (next + Self::RECORD <= oldest).then_some(next);
        }
        if next == oldest && count != 0 {
            return None;
        }
        if next + Self::RECORD <= BUF {
            Some(next)
        } else if Self::RECORD <= oldest {
            Some(0)
        } else {
            None
        }
    }

    /// Start and length of the oldest record.
    ///
    /// # Safety
    ///
    /// Consumer only, with `count != 0` observed via acquire.
    unsafe fn oldest_record(&self) -> (usize, usize) {
        let oldest = self.oldest.load(Ordering::Relaxed) as usize;
        // SAFETY: a queued record (or its marker) starts at `oldest`.
        let first = unsafe { self.byte_ptr(oldest).read() };
        let start = if first == WRAP_MARKER { 0 } else { oldest };
        // SAFETY: as above; `start` is a record's length byte.
        let len = unsafe { self.byte_ptr(start).read() } as usize;
        (start, len)
    }
}

impl<const MAX: usize, const BUF: usize> Default for VarLenRxQueue<MAX, BUF> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const MAX: usize, const BUF: usize> RxQueue for VarLenRxQueue<MAX, BUF> {
    fn capacity(&self) -> RxCapacity {
        // Worst case loses one record's worth to the tail fragment.
        RxCapacity {
            min_queued_frames: (BUF / Self::RECORD - 1) as u8,
            max_frame_len: MAX as u8,
        }
    }

    fn queued_count(&self) -> u8 {
        self.count.load(Ordering::Acquire)
    }

    fn is_full(&self) -> bool {
        self.placement().is_none()
    }

    fn dropped_frames(&self) -> u16 {
        self.dropped.load(Ordering::Relaxed)
    }

    unsafe fn reserve_slot(&self) -> Option<(usize, &mut [u8])> {
        let Some(start) = self.placement() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        // SAFETY: [start, start + MAX + 1) is free space that the consumer
        // does not read, and `placement` kept it inside the ring.
        let payload = unsafe { core::slice::from_raw_parts_mut(self.byte_ptr(start + 1), MAX) };
        Some((start, payload))
    }

    unsafe fn commit_slot(&self, at: usize, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        if len > MAX {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let next = self.next.load(Ordering::Relaxed) as usize;
        // SAFETY: `next` and `at` lie in space this producer reserved.
        unsafe {
            if at != next {
                self.byte_ptr(next).write(WRAP_MARKER);
            }
            self.byte_ptr(at).write(len as u8);
        }
        self.next
            .store(Self::wrap_index(at + 1 + len), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
        true
    }

    unsafe fn peek_oldest_slot(&self) -> Option<&[u8]> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }
        // SAFETY: consumer only and the queue is non-empty.
        let (start, len) = unsafe { self.oldest_record() };
        // SAFETY: the record is published and the producer leaves it alone
        // until it is removed.
        Some(unsafe { core::slice::from_raw_parts(self.byte_ptr(start + 1).cast_const(), len) })
    }

    unsafe fn remove_oldest_slot(&self) {
        if self.count.load(Ordering::Acquire) == 0 {
            return;
        }
        // SAFETY: consumer only and the queue is non-empty.
        let (start, len) = unsafe { self.oldest_record() };
        self.oldest
            .store(Self::wrap_index(start + 1 + len), Ordering::Release);
        self.count.fetch_sub(1, Ordering::Release);
    }
}
