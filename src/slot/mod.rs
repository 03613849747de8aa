//! Slots: the bounded FIFO, its lock and its two wait conditions.
mod message;
mod queue;
#[cfg(feature = "stats")]
mod stats;
mod transfer;

use std::{fmt, sync::Arc};

use async_mutex::{Mutex, MutexGuard};

pub use queue::SlotQueue;
#[cfg(feature = "stats")]
pub use stats::SlotStats;

use crate::{
    error::Result,
    observe::{SlotEvent, SlotEventKind, SlotObserver},
    protocol::SlotId,
    sync::{Cancel, Condition, Parked},
};

/// Parameters a slot is created with.
#[derive(Clone)]
pub(crate) struct SlotConfig {
    pub(crate) capacity: usize,
    pub(crate) max_message_size: usize,
    pub(crate) observer: Option<Arc<dyn SlotObserver>>,
    /// Slot whose creation fails with [`Error::OutOfMemory`](`crate::Error::OutOfMemory`).
    #[cfg(test)]
    pub(crate) fail_at: Option<SlotId>,
}

/// A message slot.
///
/// Owns the [`SlotQueue`] behind an exclusive lock and the two wait
/// conditions readers and writers park on. Slots are created by the
/// [`Registry`](`crate::Registry`) and shared among the
/// [`Endpoint`](`crate::Endpoint`)s opened on them.
///
/// The lock can also be taken directly with [`Slot::try_lock()`] or
/// [`Slot::lock()`] to operate on the queue. In that case the caller is
/// responsible for notifying the opposite role once the guard is released.
pub struct Slot {
    id: SlotId,
    queue: Mutex<SlotQueue>,
    /// Readers waiting for the queue to be non-empty.
    has_message: Condition,
    /// Writers waiting for the queue to have room.
    has_space: Condition,
    observer: Option<Arc<dyn SlotObserver>>,
    #[cfg(feature = "stats")]
    stats: stats::SlotCounters,
}

impl Slot {
    pub(crate) fn try_new(id: SlotId, config: &SlotConfig) -> Result<Self> {
        #[cfg(test)]
        if config.fail_at == Some(id) {
            return Err(crate::Error::OutOfMemory);
        }
        let queue = SlotQueue::try_new(id, config.capacity, config.max_message_size)?;

        Ok(Self {
            id,
            queue: Mutex::new(queue),
            has_message: Condition::new(),
            has_space: Condition::new(),
            observer: config.observer.clone(),
            #[cfg(feature = "stats")]
            stats: stats::SlotCounters::new(),
        })
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Attempts to take the slot lock exactly once, never waiting.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, SlotQueue>> {
        self.queue.try_lock()
    }

    /// Waits for the slot lock.
    pub async fn lock(&self) -> MutexGuard<'_, SlotQueue> {
        self.queue.lock().await
    }

    /// Waits for the slot lock, or until `cancel` fires.
    ///
    /// A free lock is taken right away even if `cancel` has already fired.
    pub(crate) async fn lock_interruptible(
        &self,
        cancel: Cancel<'_>,
    ) -> Option<MutexGuard<'_, SlotQueue>> {
        if let Some(guard) = self.queue.try_lock() {
            return Some(guard);
        }

        tracing::trace!(slot = self.id, "slot lock contended, waiting");
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            guard = self.queue.lock() => Some(guard),
        }
    }

    /// Registers a reader waiting for a message. Call while holding the lock.
    pub(crate) fn park_for_message(&self) -> Parked {
        self.has_message.park()
    }

    /// Registers a writer waiting for space. Call while holding the lock.
    pub(crate) fn park_for_space(&self) -> Parked {
        self.has_space.park()
    }

    /// Wakes one reader waiting for a message. Call after releasing the lock.
    pub fn notify_message_available(&self) {
        let n = self.has_message.notify_one();
        tracing::trace!(slot = self.id, woken = n, "message available");
    }

    /// Wakes one writer waiting for space. Call after releasing the lock.
    pub fn notify_space_available(&self) {
        let n = self.has_space.notify_one();
        tracing::trace!(slot = self.id, woken = n, "space available");
    }

    /// Number of queued messages, if the lock is free.
    pub fn try_len(&self) -> Option<usize> {
        self.queue.try_lock().map(|q| q.len())
    }

    /// Retrieves the statistics of the slot.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> SlotStats {
        self.stats.snapshot()
    }

    fn emit(&self, kind: SlotEventKind, count: usize) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_event(&SlotEvent {
                slot: self.id,
                kind,
                count,
            });
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let dropped = self.queue.get_mut().clear();
        tracing::trace!(slot = self.id, dropped, "slot destroyed");
        self.emit(SlotEventKind::Destroyed { dropped }, 0);
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.queue.try_lock() {
            Some(queue) => write!(f, "Slot {{ id: {}, queue: {:?} }}", self.id, &*queue),
            None => write!(f, "Slot {{ id: {}, queue: <locked> }}", self.id),
        }
    }
}
