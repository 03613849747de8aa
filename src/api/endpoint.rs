//! Sessions on a slot.
//!
//! An [`Endpoint`] is what a process gets when it opens a slot: a handle on the
//! shared [`Slot`] together with the per-session settings, i.e. the
//! [`IoMode`] and the interruption signal.
//!
//! # Examples
//!
//! ```
//! # #[tokio::main]
//! # async fn main() -> Result<(), mailslot::Error> {
//! let registry = mailslot::registry().instances(4).build()?;
//!
//! let writer = registry.open(0)?;
//! let mut reader = registry.open(0)?;
//!
//! writer.write(b"ciao mondo!").await?;
//!
//! let mut buf = [0u8; 64];
//! let n = reader.read(&mut buf).await?;
//! assert_eq!(&buf[..n], b"ciao mondo!");
//!
//! // Nothing left: a non-blocking session fails instead of waiting
//! reader.set_nonblocking(true);
//! assert_eq!(reader.read(&mut buf).await, Err(mailslot::Error::WouldBlock));
//! # Ok(())
//! # }
//! ```
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[cfg(feature = "stats")]
use crate::slot::SlotStats;
use crate::{
    error::{Error, Result},
    protocol::{Command, IoMode, LIMIT_MAX_MSG_SIZE, SlotId},
    slot::Slot,
    sync::{Cancel, Signal},
};

/// An open session on a slot.
///
/// Several endpoints can be opened on the same slot, each with its own
/// [`IoMode`]. Every message written through any of them is delivered to
/// exactly one reader, in FIFO order.
///
/// # Blocking and non-blocking I/O
///
/// In [`IoMode::Blocking`] (the default) [`write()`](`Endpoint::write`) waits
/// for space and [`read()`](`Endpoint::read`) waits for a message. A waiting
/// operation can be interrupted with an [`Interrupter`], or by shutting down
/// the registry, in which case it fails with [`Error::Cancelled`].
///
/// In [`IoMode::NonBlocking`] the same calls complete on their first poll and
/// fail with [`Error::WouldBlock`] whenever they would have to wait.
/// [`try_write()`](`Endpoint::try_write`) and [`try_read()`](`Endpoint::try_read`)
/// are the synchronous flavor of this, whatever the session mode.
pub struct Endpoint {
    slot: Arc<Slot>,
    mode: IoMode,
    signal: Arc<Signal>,
    /// Child of the registry token, cancelled at shutdown.
    token: CancellationToken,
}

impl Endpoint {
    pub(crate) fn new(slot: Arc<Slot>, token: CancellationToken) -> Self {
        tracing::trace!(slot = slot.id(), "endpoint opened");
        Self {
            slot,
            mode: IoMode::DEFAULT,
            signal: Arc::new(Signal::new()),
            token,
        }
    }

    /// Writes the first `size` bytes of `payload` as one message.
    ///
    /// This is the raw, syscall-shaped flavor of [`write()`](`Endpoint::write`):
    /// - a `size` of zero is a no-op and returns `Ok(0)`;
    /// - a missing payload fails with [`Error::BadAddress`], as does a payload
    ///   shorter than `size`;
    /// - a message larger than the slot bound fails with
    ///   [`Error::MessageTooLarge`], nothing is written.
    ///
    /// Returns the number of bytes written, always `size` on success.
    pub async fn write_raw(&self, payload: Option<&[u8]>, size: usize) -> Result<usize> {
        if size == 0 {
            return Ok(0);
        }
        let Some(payload) = payload else {
            tracing::debug!(slot = self.slot.id(), "write from a null buffer");
            return Err(Error::BadAddress);
        };
        self.check_open()?;

        match self.mode {
            IoMode::NonBlocking => self.slot.try_write(payload, size),
            IoMode::Blocking => self.slot.write(payload, size, self.cancel()).await,
        }
    }

    /// Reads one message into the first `size` bytes of `buf`.
    ///
    /// This is the raw, syscall-shaped flavor of [`read()`](`Endpoint::read`):
    /// - a `size` of zero or a missing buffer is a no-op and returns `Ok(0)`;
    /// - a message larger than `size` fails with [`Error::BufferTooSmall`] and
    ///   stays in the slot;
    /// - a buffer actually shorter than the message fails with
    ///   [`Error::BadAddress`] and the message stays in the slot.
    ///
    /// Returns the size of the message read.
    pub async fn read_raw(&self, buf: Option<&mut [u8]>, size: usize) -> Result<usize> {
        let Some(buf) = buf else {
            return Ok(0);
        };
        if size == 0 {
            return Ok(0);
        }
        self.check_open()?;

        match self.mode {
            IoMode::NonBlocking => self.slot.try_read(buf, size),
            IoMode::Blocking => self.slot.read(buf, size, self.cancel()).await,
        }
    }

    /// Writes `payload` as one message, according to the session mode.
    pub async fn write(&self, payload: &[u8]) -> Result<usize> {
        self.write_raw(Some(payload), payload.len()).await
    }

    /// Reads one message into `buf`, according to the session mode.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let size = buf.len();
        self.read_raw(Some(buf), size).await
    }

    /// Reads one message into a freshly allocated buffer.
    pub async fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; LIMIT_MAX_MSG_SIZE];
        let n = self.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes `payload` as one message without ever waiting, whatever the
    /// session mode.
    pub fn try_write(&self, payload: &[u8]) -> Result<usize> {
        if payload.is_empty() {
            return Ok(0);
        }
        self.check_open()?;
        self.slot.try_write(payload, payload.len())
    }

    /// Reads one message into `buf` without ever waiting, whatever the
    /// session mode.
    pub fn try_read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.check_open()?;
        let size = buf.len();
        self.slot.try_read(buf, size)
    }

    /// Returns a handle to interrupt the blocking operations of this session.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            slot: self.slot.id(),
            signal: self.signal.clone(),
        }
    }

    /// Applies a configuration command.
    ///
    /// [`Command::SetNonBlocking`] only affects this session.
    /// [`Command::SetMaxMessageSize`] affects the slot, hence every session
    /// opened on it: it takes the slot lock in the session mode, failing with
    /// [`Error::WouldBlock`] (non-blocking) or [`Error::Cancelled`]
    /// (interrupted) if the lock cannot be taken.
    pub async fn control(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SetNonBlocking(nb) => {
                self.set_nonblocking(nb);
            }
            Command::SetMaxMessageSize(size) => {
                self.check_open()?;
                match self.mode {
                    IoMode::NonBlocking => self.slot.try_set_max_message_size(size)?,
                    IoMode::Blocking => self.slot.set_max_message_size(size, self.cancel()).await?,
                };
            }
        }
        Ok(())
    }

    /// Decodes and applies a raw configuration command.
    ///
    /// Unknown codes fail with [`Error::UnsupportedOperation`].
    ///
    /// ```
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailslot::Error> {
    /// let registry = mailslot::registry().build()?;
    /// let mut endpoint = registry.open(0)?;
    ///
    /// endpoint.ioctl(mailslot::SET_MAX_MSG_SIZE, 128).await?;
    /// assert_eq!(
    ///     endpoint.ioctl(mailslot::SET_MAX_MSG_SIZE, 0).await,
    ///     Err(mailslot::Error::InvalidArgument)
    /// );
    /// assert_eq!(endpoint.ioctl(42, 0).await, Err(mailslot::Error::UnsupportedOperation(42)));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn ioctl(&mut self, code: u32, arg: u64) -> Result<()> {
        let command = Command::decode(code, arg).inspect_err(|e| {
            tracing::debug!(slot = self.slot.id(), code, error = %e, "invalid command");
        })?;
        self.control(command).await
    }

    pub fn set_nonblocking(&mut self, non_blocking: bool) {
        self.mode = IoMode::from_nonblocking(non_blocking);
        tracing::trace!(slot = self.slot.id(), mode = ?self.mode, "io mode set");
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot.id()
    }

    /// Returns the slot this session is opened on.
    pub fn slot(&self) -> &Arc<Slot> {
        &self.slot
    }

    /// Retrieves the statistics of the underlying slot.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> SlotStats {
        self.slot.stats()
    }

    fn cancel(&self) -> Cancel<'_> {
        Cancel::new(&self.signal, &self.token)
    }

    fn check_open(&self) -> Result<()> {
        if self.token.is_cancelled() {
            tracing::debug!(slot = self.slot.id(), "registry shut down");
            return Err(Error::ShutDown);
        }
        Ok(())
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        tracing::trace!(slot = self.slot.id(), "endpoint closed");
    }
}

/// Handle interrupting the blocking operations of an [`Endpoint`].
///
/// This is the equivalent of delivering a signal to the process owning the
/// session: the blocking operation currently waiting fails with
/// [`Error::Cancelled`]. If none is waiting, the next one that would wait is
/// interrupted instead. Each interruption is consumed by exactly one operation.
#[derive(Clone)]
pub struct Interrupter {
    slot: SlotId,
    signal: Arc<Signal>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        tracing::debug!(slot = self.slot, "interrupting session");
        self.signal.raise();
    }

    /// Returns whether an interruption is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.signal.is_pending()
    }
}
