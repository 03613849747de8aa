//! Read/write retry protocol on top of the slot lock and conditions.
//!
//! Every operation follows the same steps: take the lock, try the queue
//! operation, release the lock, then act on the outcome. On success the
//! opposite role is notified. On a full (write) or empty (read) queue a
//! non-blocking caller gets [`Error::WouldBlock`], while a blocking caller
//! parks on the matching condition and retries once woken up.
//!
//! The waiter is registered before the lock is released, so a transfer
//! completed right after the release always finds it.
//!
//! Wake-ups are one at a time. A woken caller whose retry fails while the
//! condition still holds (e.g. its buffer is too small for the queued
//! message) hands the wake-up over to the next waiter. Waiters are notified
//! before the observer sees the event.
use super::Slot;
use crate::{
    error::{Error, Result},
    observe::SlotEventKind,
    protocol::{IoMode, validate_max_message_size},
    sync::{Cancel, Parked},
};

/// Outcome of one pass of a blocking operation.
enum Attempt<T> {
    Done(T),
    /// Failed, with whether the condition the caller may have been woken
    /// for still holds.
    Failed(Error, bool),
    Park(Parked),
}

impl Slot {
    /// Writes the first `size` bytes of `payload` without ever waiting.
    ///
    /// Fails with [`Error::WouldBlock`] if the lock is busy or the slot is full.
    pub(crate) fn try_write(&self, payload: &[u8], size: usize) -> Result<usize> {
        let Some(mut queue) = self.try_lock() else {
            return Err(self.would_block("write", "lock busy"));
        };
        let res = queue.enqueue(payload, size, IoMode::NonBlocking);
        let count = queue.len();
        drop(queue);

        match res {
            Ok(n) => {
                self.enqueued(n, count);
                Ok(n)
            }
            Err(Error::SlotFull) => Err(self.would_block("write", "slot full")),
            Err(e) => Err(self.failed("write", e)),
        }
    }

    /// Writes the first `size` bytes of `payload`, waiting for the lock and
    /// for space as needed.
    ///
    /// Fails with [`Error::Cancelled`] if `cancel` fires while waiting.
    pub(crate) async fn write(&self, payload: &[u8], size: usize, cancel: Cancel<'_>) -> Result<usize> {
        let mut woken = false;
        loop {
            let Some(mut queue) = self.lock_interruptible(cancel).await else {
                if woken {
                    self.notify_space_available();
                }
                return Err(self.interrupted("write"));
            };
            let attempt = match queue.enqueue(payload, size, IoMode::Blocking) {
                Ok(n) => Attempt::Done((n, queue.len())),
                Err(Error::SlotFull) => Attempt::Park(self.park_for_space()),
                Err(e) => Attempt::Failed(e, !queue.is_full()),
            };
            drop(queue);

            match attempt {
                Attempt::Done((n, count)) => {
                    self.enqueued(n, count);
                    return Ok(n);
                }
                Attempt::Failed(e, has_space) => {
                    // Hand the wake-up over to another writer
                    if woken && has_space {
                        self.notify_space_available();
                    }
                    return Err(self.failed("write", e));
                }
                Attempt::Park(parked) => {
                    tracing::trace!(slot = self.id, "slot full, waiting for space");
                    if parked.wait(cancel).await.is_err() {
                        return Err(self.interrupted("write"));
                    }
                    woken = true;
                }
            }
        }
    }

    /// Reads the head message into `buf` without ever waiting.
    ///
    /// Fails with [`Error::WouldBlock`] if the lock is busy or the slot is empty.
    pub(crate) fn try_read(&self, buf: &mut [u8], buffer_size: usize) -> Result<usize> {
        let Some(mut queue) = self.try_lock() else {
            return Err(self.would_block("read", "lock busy"));
        };
        let res = queue.dequeue(buf, buffer_size);
        let count = queue.len();
        drop(queue);

        match res {
            Ok(Some(n)) => {
                self.dequeued(n, count);
                Ok(n)
            }
            Ok(None) => Err(self.would_block("read", "slot empty")),
            Err(e) => Err(self.failed("read", e)),
        }
    }

    /// Reads the head message into `buf`, waiting for the lock and for a
    /// message as needed.
    ///
    /// Fails with [`Error::Cancelled`] if `cancel` fires while waiting.
    pub(crate) async fn read(&self, buf: &mut [u8], buffer_size: usize, cancel: Cancel<'_>) -> Result<usize> {
        let mut woken = false;
        loop {
            let Some(mut queue) = self.lock_interruptible(cancel).await else {
                if woken {
                    self.notify_message_available();
                }
                return Err(self.interrupted("read"));
            };
            let attempt = match queue.dequeue(buf, buffer_size) {
                Ok(Some(n)) => Attempt::Done((n, queue.len())),
                Ok(None) => Attempt::Park(self.park_for_message()),
                Err(e) => Attempt::Failed(e, !queue.is_empty()),
            };
            drop(queue);

            match attempt {
                Attempt::Done((n, count)) => {
                    self.dequeued(n, count);
                    return Ok(n);
                }
                Attempt::Failed(e, has_message) => {
                    // The message is still there: hand the wake-up over to
                    // another reader, whose buffer may fit it
                    if woken && has_message {
                        self.notify_message_available();
                    }
                    return Err(self.failed("read", e));
                }
                Attempt::Park(parked) => {
                    tracing::trace!(slot = self.id, "slot empty, waiting for a message");
                    if parked.wait(cancel).await.is_err() {
                        return Err(self.interrupted("read"));
                    }
                    woken = true;
                }
            }
        }
    }

    /// Sets the maximum message size, failing with [`Error::WouldBlock`] if
    /// the lock is busy.
    pub(crate) fn try_set_max_message_size(&self, size: i64) -> Result<usize> {
        let size = validate_max_message_size(size).map_err(|e| self.failed("set max message size", e))?;
        let Some(mut queue) = self.try_lock() else {
            return Err(self.would_block("set max message size", "lock busy"));
        };
        let res = queue.set_max_message_size(size as i64);
        let count = queue.len();
        drop(queue);

        self.max_message_size_changed(res, count)
    }

    /// Sets the maximum message size, waiting for the lock.
    pub(crate) async fn set_max_message_size(&self, size: i64, cancel: Cancel<'_>) -> Result<usize> {
        let size = validate_max_message_size(size).map_err(|e| self.failed("set max message size", e))?;
        let Some(mut queue) = self.lock_interruptible(cancel).await else {
            return Err(self.interrupted("set max message size"));
        };
        let res = queue.set_max_message_size(size as i64);
        let count = queue.len();
        drop(queue);

        self.max_message_size_changed(res, count)
    }

    fn enqueued(&self, size: usize, count: usize) {
        if size == 0 {
            return;
        }
        tracing::trace!(slot = self.id, size, count, "message written");
        #[cfg(feature = "stats")]
        self.stats.enqueued(size);
        self.notify_message_available();
        self.emit(SlotEventKind::Enqueued { size }, count);
    }

    fn dequeued(&self, size: usize, count: usize) {
        tracing::trace!(slot = self.id, size, count, "message read");
        #[cfg(feature = "stats")]
        self.stats.dequeued(size);
        self.notify_space_available();
        self.emit(SlotEventKind::Dequeued { size }, count);
    }

    fn max_message_size_changed(&self, res: Result<usize>, count: usize) -> Result<usize> {
        let max = res.map_err(|e| self.failed("set max message size", e))?;
        tracing::info!(slot = self.id, max, "max message size set");
        self.emit(SlotEventKind::MaxMessageSizeChanged { max }, count);
        Ok(max)
    }

    fn would_block(&self, op: &'static str, reason: &'static str) -> Error {
        tracing::debug!(slot = self.id, op, reason, "operation would block");
        #[cfg(feature = "stats")]
        self.stats.would_block();
        Error::WouldBlock
    }

    fn interrupted(&self, op: &'static str) -> Error {
        tracing::debug!(slot = self.id, op, "operation interrupted");
        #[cfg(feature = "stats")]
        self.stats.cancelled();
        Error::Cancelled
    }

    fn failed(&self, op: &'static str, e: Error) -> Error {
        tracing::debug!(slot = self.id, op, error = %e, "operation failed");
        #[cfg(feature = "stats")]
        if e == Error::WouldBlock {
            self.stats.would_block();
        }
        e
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        observe::{SlotEvent, SlotObserver, tests::Recorder},
        protocol::{DEFAULT_MAX_MSG_SIZE, MAX_SLOT_SIZE},
        slot::tests::config,
        sync::Signal,
    };

    const TIMEOUT: Duration = Duration::from_secs(3);

    struct Session {
        signal: Signal,
        token: CancellationToken,
    }

    impl Session {
        fn new() -> Self {
            Self {
                signal: Signal::new(),
                token: CancellationToken::new(),
            }
        }

        fn cancel(&self) -> Cancel<'_> {
            Cancel::new(&self.signal, &self.token)
        }
    }

    fn fill(slot: &Slot) {
        for i in 0..MAX_SLOT_SIZE {
            assert_eq!(slot.try_write(&[i as u8; 8], 8), Ok(8));
        }
    }

    #[test]
    fn test_nonblocking() {
        let slot = Slot::try_new(0, &config(None)).unwrap();

        let mut buf = [0u8; DEFAULT_MAX_MSG_SIZE];
        assert_eq!(slot.try_read(&mut buf, DEFAULT_MAX_MSG_SIZE), Err(Error::WouldBlock));

        fill(&slot);
        assert_eq!(slot.try_write(b"ciao", 4), Err(Error::WouldBlock));
        assert_eq!(slot.try_len(), Some(MAX_SLOT_SIZE));

        // Busy lock
        let guard = slot.try_lock().unwrap();
        assert_eq!(slot.try_read(&mut buf, DEFAULT_MAX_MSG_SIZE), Err(Error::WouldBlock));
        assert_eq!(slot.try_set_max_message_size(128), Err(Error::WouldBlock));
        drop(guard);

        for i in 0..MAX_SLOT_SIZE {
            assert_eq!(slot.try_read(&mut buf, DEFAULT_MAX_MSG_SIZE), Ok(8));
            assert_eq!(&buf[..8], &[i as u8; 8]);
        }
    }

    #[tokio::test]
    async fn test_blocking_no_wait() {
        let slot = Slot::try_new(0, &config(None)).unwrap();
        let session = Session::new();

        assert_eq!(slot.write(b"ciao mondo!", 12, session.cancel()).await, Err(Error::BadAddress));
        assert_eq!(slot.write(b"ciao mondo!\0", 12, session.cancel()).await, Ok(12));

        let mut buf = [0u8; 16];
        assert_eq!(
            slot.read(&mut buf, 11, session.cancel()).await,
            Err(Error::BufferTooSmall { size: 12, available: 11 })
        );
        assert_eq!(slot.read(&mut buf, 16, session.cancel()).await, Ok(12));
        assert_eq!(&buf[..12], b"ciao mondo!\0");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_blocked_writer_released() {
        let slot = Arc::new(Slot::try_new(0, &config(None)).unwrap());
        fill(&slot);

        let c_slot = slot.clone();
        let writer = tokio::spawn(async move {
            let session = Session::new();
            c_slot.write(b"last", 4, session.cancel()).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());

        let mut buf = [0u8; 8];
        assert_eq!(slot.try_read(&mut buf, 8), Ok(8));
        assert_eq!(timeout(TIMEOUT, writer).await.unwrap().unwrap(), Ok(4));
        assert_eq!(slot.try_len(), Some(MAX_SLOT_SIZE));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_blocked_reader_released() {
        let slot = Arc::new(Slot::try_new(0, &config(None)).unwrap());

        let c_slot = slot.clone();
        let reader = tokio::spawn(async move {
            let session = Session::new();
            let mut buf = [0u8; 16];
            let n = c_slot.read(&mut buf, 16, session.cancel()).await?;
            Ok::<_, Error>(buf[..n].to_vec())
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        assert_eq!(slot.try_write(b"hello", 5), Ok(5));
        let msg = timeout(TIMEOUT, reader).await.unwrap().unwrap().unwrap();
        assert_eq!(msg, b"hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wakeup_handed_over() {
        let slot = Arc::new(Slot::try_new(0, &config(None)).unwrap());

        // Parked first, woken first, but its buffer cannot hold the message
        let c_slot = slot.clone();
        let small = tokio::spawn(async move {
            let session = Session::new();
            let mut buf = [0u8; 2];
            c_slot.read(&mut buf, 2, session.cancel()).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let c_slot = slot.clone();
        let large = tokio::spawn(async move {
            let session = Session::new();
            let mut buf = [0u8; 64];
            let n = c_slot.read(&mut buf, 64, session.cancel()).await?;
            Ok::<_, Error>(buf[..n].to_vec())
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!small.is_finished());
        assert!(!large.is_finished());

        assert_eq!(slot.try_write(b"hello", 5), Ok(5));
        assert_eq!(
            timeout(TIMEOUT, small).await.unwrap().unwrap(),
            Err(Error::BufferTooSmall { size: 5, available: 2 })
        );
        let msg = timeout(TIMEOUT, large).await.unwrap().unwrap().unwrap();
        assert_eq!(msg, b"hello");
        assert_eq!(slot.try_len(), Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wakeup_before_event() {
        use std::sync::{
            Mutex,
            atomic::{AtomicBool, Ordering},
            mpsc,
        };

        // Holds the writer inside the observer until the reader is done
        struct Gate {
            done: Mutex<mpsc::Receiver<()>>,
            released: AtomicBool,
        }

        impl SlotObserver for Gate {
            fn on_event(&self, event: &SlotEvent) {
                if let SlotEventKind::Enqueued { .. } = event.kind {
                    let done = self.done.lock().unwrap().recv_timeout(TIMEOUT).is_ok();
                    self.released.store(done, Ordering::SeqCst);
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        let gate = Arc::new(Gate {
            done: Mutex::new(rx),
            released: AtomicBool::new(false),
        });
        let slot = Arc::new(Slot::try_new(0, &config(Some(gate.clone()))).unwrap());

        let c_slot = slot.clone();
        let reader = tokio::spawn(async move {
            let session = Session::new();
            let mut buf = [0u8; 16];
            let res = c_slot.read(&mut buf, 16, session.cancel()).await;
            let _ = tx.send(());
            res
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let c_slot = slot.clone();
        let written = tokio::task::spawn_blocking(move || c_slot.try_write(b"ciao", 4));
        assert_eq!(timeout(TIMEOUT * 2, written).await.unwrap().unwrap(), Ok(4));
        assert_eq!(timeout(TIMEOUT, reader).await.unwrap().unwrap(), Ok(4));
        // The reader completed while the writer was still reporting the event
        assert!(gate.released.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_interrupted() {
        let slot = Arc::new(Slot::try_new(0, &config(None)).unwrap());
        let session = Arc::new(Session::new());

        let c_slot = slot.clone();
        let c_session = session.clone();
        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            c_slot.read(&mut buf, 16, c_session.cancel()).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        session.signal.raise();
        assert_eq!(timeout(TIMEOUT, reader).await.unwrap().unwrap(), Err(Error::Cancelled));
        // The signal was consumed by the interrupted read
        assert!(!session.signal.is_pending());

        // Registry-wide cancellation
        fill(&slot);
        let c_slot = slot.clone();
        let c_session = session.clone();
        let writer = tokio::spawn(async move { c_slot.write(b"ciao", 4, c_session.cancel()).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        session.token.cancel();
        assert_eq!(timeout(TIMEOUT, writer).await.unwrap().unwrap(), Err(Error::Cancelled));
        assert_eq!(slot.try_len(), Some(MAX_SLOT_SIZE));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_wait_interrupted() {
        let slot = Arc::new(Slot::try_new(0, &config(None)).unwrap());
        let session = Arc::new(Session::new());

        let guard = slot.lock().await;

        let c_slot = slot.clone();
        let c_session = session.clone();
        let setter =
            tokio::spawn(async move { c_slot.set_max_message_size(128, c_session.cancel()).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        session.signal.raise();
        assert_eq!(timeout(TIMEOUT, setter).await.unwrap().unwrap(), Err(Error::Cancelled));

        // Lock was never taken, bound unchanged
        assert_eq!(guard.max_message_size(), DEFAULT_MAX_MSG_SIZE);
    }

    #[tokio::test]
    async fn test_set_max_message_size() {
        let slot = Slot::try_new(0, &config(None)).unwrap();
        let session = Session::new();

        assert_eq!(slot.set_max_message_size(128, session.cancel()).await, Ok(128));
        assert_eq!(slot.try_write(&[0; 129], 129), Err(Error::MessageTooLarge { size: 129, max: 128 }));
        assert_eq!(slot.try_write(&[0; 128], 128), Ok(128));

        // Invalid values are rejected before taking the lock
        let guard = slot.try_lock().unwrap();
        assert_eq!(slot.try_set_max_message_size(0), Err(Error::InvalidArgument));
        assert_eq!(slot.set_max_message_size(-10, session.cancel()).await, Err(Error::InvalidArgument));
        drop(guard);

        assert_eq!(slot.try_set_max_message_size(513), Err(Error::InvalidArgument));
        assert_eq!(slot.try_set_max_message_size(512), Ok(512));
    }

    #[tokio::test]
    async fn test_events() {
        let recorder = Arc::new(Recorder::default());
        let slot = Slot::try_new(2, &config(Some(recorder.clone()))).unwrap();

        slot.try_write(b"ciao", 4).unwrap();
        slot.try_write(b"mondo", 5).unwrap();
        // Failures are not mutations
        let _ = slot.try_write(&[0; 300], 300);
        let mut buf = [0u8; 8];
        slot.try_read(&mut buf, 8).unwrap();
        slot.try_set_max_message_size(64).unwrap();
        drop(slot);

        let kinds: Vec<(SlotEventKind, usize)> =
            recorder.events().iter().map(|e: &SlotEvent| (e.kind, e.count)).collect();
        assert_eq!(
            kinds,
            vec![
                (SlotEventKind::Enqueued { size: 4 }, 1),
                (SlotEventKind::Enqueued { size: 5 }, 2),
                (SlotEventKind::Dequeued { size: 4 }, 1),
                (SlotEventKind::MaxMessageSizeChanged { max: 64 }, 1),
                (SlotEventKind::Destroyed { dropped: 1 }, 0),
            ]
        );
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_stats() {
        let slot = Slot::try_new(0, &config(None)).unwrap();
        let mut buf = [0u8; 8];

        assert_eq!(slot.try_read(&mut buf, 8), Err(Error::WouldBlock));
        slot.try_write(b"ciao", 4).unwrap();
        slot.try_read(&mut buf, 8).unwrap();

        let stats = slot.stats();
        assert_eq!(stats.messages_in, 1);
        assert_eq!(stats.bytes_in, 4);
        assert_eq!(stats.messages_out, 1);
        assert_eq!(stats.bytes_out, 4);
        assert_eq!(stats.would_block, 1);
    }
}
