//! Mailslot: bounded FIFO message slots shared by concurrent producers and
//! consumers, with blocking and non-blocking I/O.
//!
//! A [`Registry`] holds a fixed number of independent slots, each one
//! addressed by a numeric identifier. Every slot queues discrete,
//! variable-length messages: a write enqueues one whole message, a read
//! dequeues one whole message. Messages are never merged, split or truncated,
//! and each one is delivered to exactly one reader, in the order it was
//! written.
//!
//! # Overview
//!
//! The diagram below illustrates two writers and two readers sharing slot 3.
//!
//! ```text
//!  WRITERS                                                   User code
//! ┌──────────┐  ┌──────────┐
//! │ Endpoint │  │ Endpoint │   write(m1) write(m2) write(m3)
//! └────┬─────┘  └────┬─────┘
//!      ▼             ▼
//! ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//!  SLOT 3                                                Mailslot code
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  lock ─┬─ queue:  tail → [m3][m2][m1] → head   (max 64 messages) │
//! │        ├─ has space:    writers parked while the queue is full   │
//! │        └─ has message:  readers parked while the queue is empty  │
//! └─────────────┬────────────────────────────────────────────────────┘
//!               ▼
//! ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//!  READERS                                                   User code
//! ┌──────────┐  ┌──────────┐
//! │ Endpoint │  │ Endpoint │   read() → m1   read() → m2   read() → m3
//! └──────────┘  └──────────┘
//! ```
//!
//! Every operation takes the slot lock, performs its queue operation and
//! releases the lock before doing anything else. A successful write wakes up
//! one parked reader, a successful read wakes up one parked writer.
//!
//! # Examples
//!
//! ```
//! # #[tokio::main]
//! # async fn main() -> Result<(), mailslot::Error> {
//! let registry = mailslot::registry().build()?;
//!
//! let producer = registry.open(7)?;
//! let consumer = registry.open(7)?;
//!
//! let task = tokio::spawn(async move {
//!     // Waits until a message is available
//!     consumer.recv().await
//! });
//!
//! producer.write(b"hello").await?;
//! assert_eq!(task.await.unwrap()?, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Blocking and non-blocking I/O
//!
//! Each [`Endpoint`] has its own [`IoMode`]. In blocking mode (the default) an
//! operation waits for the slot lock, for space (write) or for a message
//! (read). A waiting operation is interrupted by the session [`Interrupter`] or
//! by [`Registry::shutdown()`], and then fails with [`Error::Cancelled`].
//!
//! In non-blocking mode an operation never waits, not even for the lock: it
//! fails with [`Error::WouldBlock`] instead. [`Endpoint::try_write()`] and
//! [`Endpoint::try_read()`] are synchronous and behave this way regardless of
//! the session mode.
//!
//! # Message size
//!
//! Each slot bounds the size of the messages it accepts, [`DEFAULT_MAX_MSG_SIZE`]
//! bytes by default. The bound is changed with [`Command::SetMaxMessageSize`],
//! up to [`LIMIT_MAX_MSG_SIZE`] bytes. Lowering it does not affect the messages
//! already queued.
//!
//! A write larger than the bound fails with [`Error::MessageTooLarge`]; a read
//! into a buffer smaller than the next message fails with
//! [`Error::BufferTooSmall`] and leaves the message in the slot.
//!
//! # Observability
//!
//! All diagnostics go through [`tracing`]. A [`SlotObserver`] registered on the
//! [`RegistryBuilder`] receives a [`SlotEvent`] after each slot mutation. With
//! the `stats` feature enabled, each slot also keeps counters readable via
//! `Slot::stats()`.
mod api;
mod error;
mod observe;
mod protocol;
mod slot;
mod sync;

pub use api::*;
pub use error::{Error, Result, errno};
pub use observe::{SlotEvent, SlotEventKind, SlotObserver, TracingObserver};
pub use protocol::{
    BASE_ID, Command, DEFAULT_MAX_MSG_SIZE, INSTANCES, IOCTL_MAGIC, IoMode, LIMIT_MAX_MSG_SIZE, MAX_SLOT_SIZE,
    SET_MAX_MSG_SIZE, SET_NONBLOCKING, SlotId, validate_max_message_size,
};
#[cfg(feature = "stats")]
pub use slot::SlotStats;
pub use slot::{Slot, SlotQueue};
