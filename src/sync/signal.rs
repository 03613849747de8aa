use std::sync::atomic::{AtomicBool, Ordering};

use event_listener::Event;
use tokio_util::sync::CancellationToken;

/// Interruption flag of a session.
///
/// Raising the signal interrupts the blocking operation currently parked on
/// the session, or the next one if none is parked. The flag is consumed by the
/// operation it interrupts.
pub(crate) struct Signal {
    /// The underlying event listener for async notifications.
    event: Event,
    /// Whether a signal is pending.
    pending: AtomicBool,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self {
            event: Event::new(),
            pending: AtomicBool::new(false),
        }
    }

    pub(crate) fn raise(&self) {
        self.pending.store(true, Ordering::Release);
        self.event.notify(usize::MAX);
    }

    /// Atomically clears the pending flag, returning whether it was set.
    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Completes once the signal is raised, consuming it.
    pub(crate) async fn raised(&self) {
        loop {
            if self.take() {
                return;
            }

            // Register before checking again so that a concurrent raise is not missed
            let listener = self.event.listen();

            if self.take() {
                return;
            }

            listener.await;
        }
    }
}

/// Sources that can interrupt a blocking operation: the session signal and the
/// registry shutdown token.
#[derive(Clone, Copy)]
pub(crate) struct Cancel<'a> {
    signal: &'a Signal,
    token: &'a CancellationToken,
}

impl<'a> Cancel<'a> {
    pub(crate) fn new(signal: &'a Signal, token: &'a CancellationToken) -> Self {
        Self { signal, token }
    }

    /// Completes when either source fires.
    pub(crate) async fn cancelled(self) {
        tokio::select! {
            biased;
            () = self.token.cancelled() => {}
            () = self.signal.raised() => {}
        }
    }
}
