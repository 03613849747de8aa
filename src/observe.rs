//! Observability hook invoked after each slot mutation.
//!
//! Observers are called once the slot lock has been released, so a slow
//! observer delays the caller that performed the mutation but never the other
//! producers and consumers of the slot.
use crate::protocol::SlotId;

/// Kind of mutation applied to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEventKind {
    /// A message of `size` bytes was appended at the tail.
    Enqueued { size: usize },
    /// A message of `size` bytes was removed from the head.
    Dequeued { size: usize },
    /// The maximum message size was changed.
    MaxMessageSizeChanged { max: usize },
    /// The slot was released, together with `dropped` unread messages.
    Destroyed { dropped: usize },
}

/// A mutation of a slot, as reported to a [`SlotObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEvent {
    /// The slot that was mutated.
    pub slot: SlotId,
    /// What happened.
    pub kind: SlotEventKind,
    /// Number of messages queued right after the mutation.
    pub count: usize,
}

/// Sink for [`SlotEvent`]s.
///
/// Registered once for the whole registry via
/// [`RegistryBuilder::observer()`](`crate::RegistryBuilder::observer`).
pub trait SlotObserver: Send + Sync {
    fn on_event(&self, event: &SlotEvent);
}

/// Observer logging every event through [`tracing`] at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SlotObserver for TracingObserver {
    fn on_event(&self, event: &SlotEvent) {
        tracing::trace!(slot = event.slot, count = event.count, kind = ?event.kind, "slot mutated");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Observer recording every event, for tests.
    #[derive(Default)]
    pub(crate) struct Recorder(pub(crate) Mutex<Vec<SlotEvent>>);

    impl Recorder {
        pub(crate) fn events(&self) -> Vec<SlotEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl SlotObserver for Recorder {
        fn on_event(&self, event: &SlotEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn test_recorder() {
        let recorder = Recorder::default();
        let event = SlotEvent {
            slot: 7,
            kind: SlotEventKind::Enqueued { size: 12 },
            count: 1,
        };
        recorder.on_event(&event);
        TracingObserver.on_event(&event);
        assert_eq!(recorder.events(), vec![event]);
    }
}
