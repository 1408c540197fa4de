//! Single-slot RX queue.
//!
//! Holds at most one frame.  The stored length doubles as the occupancy
//! flag: zero means empty.  Cheapest possible queue for radios that are
//! polled faster than frames arrive.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use super::{RxCapacity, RxQueue};

pub struct OneDeepRxQueue<const MAX: usize> {
    /// Length of the held frame, 0 when empty.  Producer sets it non-zero,
    /// consumer clears it.
    len: AtomicU8,
    /// Reserve attempts that found the slot occupied.  Producer only.
    dropped: AtomicU16,
    buf: UnsafeCell<[u8; MAX]>,
}

// SAFETY: `buf` is written only by the producer while `len == 0` and read
// only by the consumer while `len != 0`; `len` hands ownership across with
// release/acquire ordering.
unsafe impl<const MAX: usize> Sync for OneDeepRxQueue<MAX> {}

impl<const MAX: usize> OneDeepRxQueue<MAX> {
    const LAYOUT_OK: () = assert!(MAX != 0 && MAX <= 255, "frame length must be 1..=255");

    pub const fn new() -> Self {
        let () = Self::LAYOUT_OK;
        Self {
            len: AtomicU8::new(0),
            dropped: AtomicU16::new(0),
            buf: UnsafeCell::new([0; MAX]),
        }
    }
}

impl<const MAX: usize> Default for OneDeepRxQueue<MAX> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const MAX: usize> RxQueue for OneDeepRxQueue<MAX> {
    fn capacity(&self) -> RxCapacity {
        RxCapacity {
            min_queued_frames: 1,
            max_frame_len: MAX as u8,
        }
    }

    fn queued_count(&self) -> u8 {
        u8::from(self.len.load(Ordering::Acquire) != 0)
    }

    fn is_full(&self) -> bool {
        self.len.load(Ordering::Acquire) != 0
    }

    fn dropped_frames(&self) -> u16 {
        self.dropped.load(Ordering::Relaxed)
    }

    unsafe fn reserve_slot(&self) -> Option<(usize, &mut [u8])> {
        if self.is_full() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        // SAFETY: slot is empty so the consumer holds no reference into it,
        // and the caller guarantees a single producer.
        let buf = unsafe { &mut *self.buf.get() };
        Some((0, &mut buf[..]))
    }

    unsafe fn commit_slot(&self, _at: usize, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        // Oversized frames are kept, truncated to the slot.
        let len = len.min(MAX);
        self.len.store(len as u8, Ordering::Release);
        true
    }

    unsafe fn peek_oldest_slot(&self) -> Option<&[u8]> {
        let len = self.len.load(Ordering::Acquire) as usize;
        if len == 0 {
            return None;
        }
        // SAFETY: a non-zero length means the producer has finished with
        // the slot and will not touch it until the consumer clears `len`.
        let buf = unsafe { &*self.buf.get() };
        Some(&buf[..len])
    }

    unsafe fn remove_oldest_slot(&self) {
        self.len.store(0, Ordering::Release);
    }
}
