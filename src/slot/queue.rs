use std::{collections::VecDeque, fmt};

use super::message::Message;
use crate::{
    error::{Error, Result},
    protocol::{IoMode, SlotId, validate_max_message_size},
};

/// The bounded FIFO of a slot.
///
/// A [`SlotQueue`] is only ever reached through the slot lock: every method
/// below assumes exclusive access, which the `&mut self` receiver enforces.
///
/// ```text
///   enqueue                                     dequeue
///      │    ┌────┬────┬────┬────┬────┐            ▲
///      └──▶ │ m5 │ m4 │ m3 │ m2 │ m1 │ ───────────┘
///           └────┴────┴────┴────┴────┘
///            tail                head
/// ```
///
/// Storage for `capacity` messages is reserved up front, so linking a message
/// never reallocates the queue itself: only the payload is allocated on write.
pub struct SlotQueue {
    id: SlotId,
    messages: VecDeque<Message>,
    capacity: usize,
    max_message_size: usize,
}

impl SlotQueue {
    /// Creates an empty queue holding up to `capacity` messages of at most
    /// `max_message_size` bytes each.
    ///
    /// Fails with [`Error::OutOfMemory`] if the queue storage cannot be reserved.
    pub(crate) fn try_new(id: SlotId, capacity: usize, max_message_size: usize) -> Result<Self> {
        let mut messages = VecDeque::new();
        messages
            .try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory)?;

        Ok(Self {
            id,
            messages,
            capacity,
            max_message_size,
        })
    }

    /// Appends a message made of the first `size` bytes of `content`.
    ///
    /// Checks are performed in order and the first failing one is reported:
    /// - [`Error::SlotFull`] if the queue already holds `capacity` messages;
    /// - [`Error::MessageTooLarge`] if `size` exceeds the current bound;
    /// - [`Error::WouldBlock`] / [`Error::OutOfMemory`] if the payload cannot
    ///   be allocated, depending on `mode`;
    /// - [`Error::BadAddress`] if `content` is shorter than `size`.
    ///
    /// On failure the queue is left untouched. An empty message is never
    /// linked: a `size` of zero succeeds with zero bytes written.
    pub fn enqueue(&mut self, content: &[u8], size: usize, mode: IoMode) -> Result<usize> {
        if self.is_full() {
            return Err(Error::SlotFull);
        }

        if size > self.max_message_size {
            return Err(Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }

        if size == 0 {
            return Ok(0);
        }

        let msg = Message::try_new(content, size, mode)?;
        self.messages.push_back(msg);

        Ok(size)
    }

    /// Moves the message at the head of the queue into `buf`.
    ///
    /// Returns `Ok(None)` when the queue is empty. `buffer_size` is the
    /// capacity the caller claims for `buf`:
    /// - if the head message is larger, fails with [`Error::BufferTooSmall`];
    /// - if `buf` is actually shorter than the message, fails with
    ///   [`Error::BadAddress`].
    ///
    /// In both cases the message stays at the head, untouched.
    pub fn dequeue(&mut self, buf: &mut [u8], buffer_size: usize) -> Result<Option<usize>> {
        let Some(head) = self.messages.front() else {
            return Ok(None);
        };

        if head.size() > buffer_size {
            return Err(Error::BufferTooSmall {
                size: head.size(),
                available: buffer_size,
            });
        }

        let size = head.copy_to(buf)?;
        // Unlinking the head releases the payload
        self.messages.pop_front();

        Ok(Some(size))
    }

    /// Returns the size of the message at the head of the queue, if any.
    pub fn peek_size(&self) -> Option<usize> {
        self.messages.front().map(Message::size)
    }

    /// Sets the bound checked by future writes.
    ///
    /// Messages already queued are not revalidated: they stay readable even if
    /// they exceed the new bound. Sizes outside `1..=LIMIT_MAX_MSG_SIZE` fail
    /// with [`Error::InvalidArgument`] and leave the bound unchanged.
    pub fn set_max_message_size(&mut self, size: i64) -> Result<usize> {
        let size = validate_max_message_size(size)?;
        self.max_message_size = size;
        Ok(size)
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.capacity
    }

    /// Releases every queued message, head first.
    ///
    /// Returns the number of messages released.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.messages.len();
        while let Some(msg) = self.messages.pop_front() {
            drop(msg);
        }
        count
    }
}

impl fmt::Debug for SlotQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotQueue")
            .field("id", &self.id)
            .field("count", &self.messages.len())
            .field("capacity", &self.capacity)
            .field("max_message_size", &self.max_message_size)
            .field("messages", &self.messages)
            .finish()
    }
}
