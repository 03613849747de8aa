use std::fmt;

use event_listener::{Event, EventListener, IntoNotification};

use super::Cancel;

// Error types
const INTERRUPTED_ERR_STR: &str = "Wait interrupted";

/// Error returned when a wait is interrupted instead of being satisfied.
pub(crate) struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Debug for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(INTERRUPTED_ERR_STR)
    }
}

impl std::error::Error for Interrupted {}

/// A wait queue with exclusive wake-up.
///
/// Each [`notify_one()`](`Condition::notify_one`) wakes at most one parked
/// waiter, so a transfer never causes a stampede of waiters racing for the
/// slot lock.
///
/// Waiters register with [`park()`](`Condition::park`) while still holding the
/// slot lock and only then release it. Any notification issued after the
/// release is therefore observed, a wake-up cannot slip in between the check
/// of the queue state and the sleep.
pub(crate) struct Condition {
    event: Event,
}

impl Condition {
    pub(crate) fn new() -> Self {
        Self { event: Event::new() }
    }

    /// Registers the caller as a waiter.
    pub(crate) fn park(&self) -> Parked {
        Parked(self.event.listen())
    }

    /// Wakes one parked waiter, if any.
    ///
    /// Returns the number of waiters woken up.
    #[inline]
    pub(crate) fn notify_one(&self) -> usize {
        self.event.notify(1.additional())
    }
}

/// A registration on a [`Condition`].
///
/// Dropping it without waiting deregisters the waiter; a notification it had
/// already received is handed over to another waiter.
#[must_use = "a parked waiter does nothing unless waited on"]
pub(crate) struct Parked(EventListener);

impl Parked {
    /// Waits for a notification, or until `cancel` fires.
    pub(crate) async fn wait(self, cancel: Cancel<'_>) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupted),
            () = self.0 => Ok(()),
        }
    }
}
