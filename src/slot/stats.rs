use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Atomic counters of a slot (only available with the `stats` feature).
///
/// Producers and consumers update different counters, each one sits on its own
/// cache line.
pub(crate) struct SlotCounters {
    messages_in: CachePadded<AtomicUsize>,
    bytes_in: CachePadded<AtomicUsize>,
    messages_out: CachePadded<AtomicUsize>,
    bytes_out: CachePadded<AtomicUsize>,
    would_block: CachePadded<AtomicUsize>,
    cancelled: CachePadded<AtomicUsize>,
}

impl SlotCounters {
    pub(crate) fn new() -> Self {
        Self {
            messages_in: CachePadded::new(AtomicUsize::new(0)),
            bytes_in: CachePadded::new(AtomicUsize::new(0)),
            messages_out: CachePadded::new(AtomicUsize::new(0)),
            bytes_out: CachePadded::new(AtomicUsize::new(0)),
            would_block: CachePadded::new(AtomicUsize::new(0)),
            cancelled: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn enqueued(&self, bytes: usize) {
        self.messages_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn dequeued(&self, bytes: usize) {
        self.messages_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn would_block(&self) {
        self.would_block.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SlotStats {
        SlotStats {
            messages_in: self.messages_in.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            messages_out: self.messages_out.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            would_block: self.would_block.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of slot statistics.
///
/// Returned by [`Slot::stats()`](`crate::Slot::stats`) and
/// [`Endpoint::stats()`](`crate::Endpoint::stats`) when the `stats` feature is
/// enabled. Counters are cumulative since the slot was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct SlotStats {
    /// Number of messages written.
    pub messages_in: usize,
    /// Total bytes written.
    pub bytes_in: usize,
    /// Number of messages read.
    pub messages_out: usize,
    /// Total bytes read.
    pub bytes_out: usize,
    /// Number of operations that failed with `WouldBlock`.
    pub would_block: usize,
    /// Number of blocking operations that were interrupted.
    pub cancelled: usize,
}
