//! Inbound radio frame queues.
//!
//! Frames arrive in interrupt context and are consumed by the main loop:
//!
//! ```text
//! ┌─────────────┐  reserve  ┌──────────────┐  peek   ┌──────────────┐
//! │ Radio ISR   │──────────▶│   RX queue   │────────▶│  Main loop   │
//! │ (producer)  │  commit   │ (lock-free)  │ remove  │  (consumer)  │
//! └─────────────┘           └──────────────┘         └──────────────┘
//! ```
//!
//! The producer copies the frame straight from the radio FIFO into a slot
//! of the queue's own storage, and the consumer reads it in place, so no
//! frame is ever copied twice.  Two layouts are provided:
//!
//! - [`OneDeepRxQueue`] — a single frame slot
//! - [`VarLenRxQueue`] — a byte ring of length-prefixed records, packing
//!   short frames densely
//!
//! Both are split into an [`RxProducer`] and an [`RxConsumer`]; the borrow
//! checker ensures there is at most one of each.

use core::ops::{Deref, DerefMut};

use serde::Serialize;

pub mod filter;
pub mod one_deep;
pub mod var_len;

pub use filter::{FrameDump, QuickFrameFilter, trim_trailing_zeros};
pub use one_deep::OneDeepRxQueue;
pub use var_len::VarLenRxQueue;

/// Static sizing of an RX queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RxCapacity {
    /// Frames of `max_frame_len` that always fit, starting from empty.
    pub min_queued_frames: u8,
    /// Largest frame a slot can hold.
    pub max_frame_len: u8,
}

// ── Queue capability ──────────────────────────────────────────

/// Storage and bookkeeping shared by producer and consumer.
///
/// The `*_slot` methods are the raw SPSC halves; use them through
/// [`split`](Self::split).
///
/// # Safety
///
/// Implementors must keep every field single-writer: producer state is
/// only written by `reserve_slot`/`commit_slot`, consumer state only by
/// `remove_oldest_slot`, and the queued count is published with release
/// ordering after the data it covers.  A reserved slot must never overlap
/// a queued frame, and a peeked frame must not be touched by the producer
/// until it has been removed.
pub unsafe trait RxQueue: Sync {
    fn capacity(&self) -> RxCapacity;

    /// Frames currently queued.  Safe from either context.
    fn queued_count(&self) -> u8;

    fn is_empty(&self) -> bool {
        self.queued_count() == 0
    }

    /// True iff a reserve would currently fail.
    fn is_full(&self) -> bool;

    /// Frames lost for lack of space or for being oversized (wrapping).
    fn dropped_frames(&self) -> u16;

    /// Reserve space for one frame of up to `max_frame_len` bytes.
    ///
    /// Returns an opaque slot position and the writable bytes.
    ///
    /// # Safety
    ///
    /// Producer only, at most one outstanding reservation.
    #[allow(clippy::mut_from_ref)]
    unsafe fn reserve_slot(&self) -> Option<(usize, &mut [u8])>;

    /// Publish `len` bytes of the slot at `at`; `len == 0` abandons it.
    /// Returns true if a frame was queued.
    ///
    /// # Safety
    ///
    /// Producer only; `at` must come from the latest `reserve_slot` and
    /// the slot's bytes must no longer be borrowed.
    unsafe fn commit_slot(&self, at: usize, len: usize) -> bool;

    /// The oldest queued frame, read in place.
    ///
    /// # Safety
    ///
    /// Consumer only; the returned bytes must not be used after
    /// `remove_oldest_slot`.
    unsafe fn peek_oldest_slot(&self) -> Option<&[u8]>;

    /// Discard the oldest queued frame; no-op when empty.
    ///
    /// # Safety
    ///
    /// Consumer only.
    unsafe fn remove_oldest_slot(&self);

    /// Split into the two endpoints.  At most one pair can be live.
    fn split(&mut self) -> (RxProducer<'_, Self>, RxConsumer<'_, Self>)
    where
        Self: Sized,
    {
        let queue: &Self = self;
        (RxProducer::new(queue), RxConsumer::new(queue))
    }
}

// ── Producer ──────────────────────────────────────────────────

/// Interrupt-side endpoint.  Every call is bounded and allocation free.
pub struct RxProducer<'q, Q: RxQueue> {
    queue: &'q Q,
    filter: Option<QuickFrameFilter>,
}

impl<'q, Q: RxQueue> RxProducer<'q, Q> {
    fn new(queue: &'q Q) -> Self {
        Self {
            queue,
            filter: None,
        }
    }

    /// Install (or clear) a fast filter run by [`receive_with`](Self::receive_with)
    /// before a frame is committed.
    pub fn set_filter(&mut self, filter: Option<QuickFrameFilter>) {
        self.filter = filter;
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn queued_count(&self) -> u8 {
        self.queue.queued_count()
    }

    /// Reserve a slot of exactly `max_frame_len` bytes, or `None` if full.
    pub fn reserve(&mut self) -> Option<RxSlot<'_, Q>> {
        // SAFETY: `&mut self` on the only producer means no other
        // reservation is outstanding.
        let (at, buf) = unsafe { self.queue.reserve_slot() }?;
        Some(RxSlot {
            queue: self.queue,
            at,
            buf,
        })
    }

    /// Reserve, let `fill` write the frame and return its length, run the
    /// installed filter, then commit.  Returns true if a frame was queued.
    pub fn receive_with(&mut self, fill: impl FnOnce(&mut [u8]) -> usize) -> bool {
        let filter = self.filter;
        let Some(mut slot) = self.reserve() else {
            return false;
        };
        let mut len = fill(&mut slot);
        if len == 0 {
            return false;
        }
        if let Some(accept) = filter {
            let seen = len.min(slot.len());
            if !accept(&slot[..seen], &mut len) {
                return false;
            }
        }
        slot.commit(len)
    }
}

/// Writable space for one inbound frame.
///
/// Dropping the slot without [`commit`](Self::commit) abandons it; the
/// queue is left as it was.
pub struct RxSlot<'p, Q: RxQueue> {
    queue: &'p Q,
    at: usize,
    buf: &'p mut [u8],
}

impl<Q: RxQueue> RxSlot<'_, Q> {
    /// Publish the first `len` bytes.  `commit(0)` abandons the slot.
    /// Returns true if a frame was queued.
    pub fn commit(self, len: usize) -> bool {
        let Self { queue, at, .. } = self;
        // SAFETY: the slot's bytes are not used past this point and `at`
        // came from the reservation that created this slot.
        unsafe { queue.commit_slot(at, len) }
    }

    /// Give the slot back without queuing anything.
    pub fn abandon(self) {}
}

impl<Q: RxQueue> Deref for RxSlot<'_, Q> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &*self.buf
    }
}

impl<Q: RxQueue> DerefMut for RxSlot<'_, Q> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut *self.buf
    }
}

// ── Consumer ──────────────────────────────────────────────────

/// Main-loop endpoint.
pub struct RxConsumer<'q, Q: RxQueue> {
    queue: &'q Q,
}

impl<'q, Q: RxQueue> RxConsumer<'q, Q> {
    fn new(queue: &'q Q) -> Self {
        Self { queue }
    }

    pub fn capacity(&self) -> RxCapacity {
        self.queue.capacity()
    }

    pub fn queued_count(&self) -> u8 {
        self.queue.queued_count()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped_frames(&self) -> u16 {
        self.queue.dropped_frames()
    }

    /// Oldest frame, in place.  Must be finished with before the next
    /// [`remove_oldest`](Self::remove_oldest).
    pub fn peek_oldest(&self) -> Option<&[u8]> {
        // SAFETY: the returned borrow holds `&self`, so it ends before
        // `remove_oldest(&mut self)` can run.
        unsafe { self.queue.peek_oldest_slot() }
    }

    /// Discard the oldest frame; does nothing when empty.
    pub fn remove_oldest(&mut self) {
        // SAFETY: single consumer by construction.
        unsafe { self.queue.remove_oldest_slot() }
    }
}
