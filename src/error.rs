use thiserror::Error;

use crate::protocol::SlotId;

/// POSIX error numbers returned by a device front end for each [`Error`].
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const EINTR: i32 = 4;
    pub const ENXIO: i32 = 6;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
    pub const ENOSPC: i32 = 28;
    pub const EMSGSIZE: i32 = 90;
    pub const ESHUTDOWN: i32 = 108;
}

/// Errors that can occur when operating on a slot.
///
/// Every error is a recoverable return value: a failed operation never leaves
/// the slot locked nor a message half-linked, and the queue is left exactly as
/// it was before the call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The slot already holds the maximum number of messages.
    ///
    /// Only returned by the queue itself: the endpoint protocol turns it into
    /// a wait (blocking mode) or [`Error::WouldBlock`] (non-blocking mode).
    #[error("Slot is full")]
    SlotFull,

    /// The message is larger than the maximum message size of the slot.
    ///
    /// Writes are all-or-nothing, a message is never truncated to fit.
    #[error("Message size ({size}) greater than the max allowed by the slot ({max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The destination buffer is smaller than the message at the head of the slot.
    ///
    /// The message is neither removed nor partially copied: a later read with
    /// a large enough buffer returns it.
    #[error("Buffer too small ({available} bytes) for the message ({size} bytes)")]
    BufferTooSmall { size: usize, available: usize },

    /// The source or destination buffer cannot be accessed for the claimed length.
    #[error("Bad address: buffer is not accessible for the requested length")]
    BadAddress,

    /// Message storage could not be allocated (blocking mode).
    #[error("Failed to allocate message storage")]
    OutOfMemory,

    /// The operation would have to wait but the session is non-blocking.
    ///
    /// In non-blocking mode this also covers allocation failures.
    #[error("Operation would block")]
    WouldBlock,

    /// A blocking operation was interrupted before completion.
    ///
    /// Caused either by the session [`Interrupter`](`crate::Interrupter`) or by
    /// the shutdown of the registry. The operation may be retried.
    #[error("Operation interrupted")]
    Cancelled,

    /// A configuration value is out of range.
    #[error("Invalid argument")]
    InvalidArgument,

    /// The configuration command is unknown.
    #[error("Unsupported command code {0:#x}")]
    UnsupportedOperation(u32),

    /// No slot is registered under the identifier.
    #[error("No slot with id {0}")]
    NoSuchSlot(SlotId),

    /// The registry has been shut down.
    #[error("Registry has been shut down")]
    ShutDown,
}

impl Error {
    /// Returns the POSIX error number matching this error.
    pub const fn errno(&self) -> i32 {
        match self {
            Self::SlotFull => errno::ENOSPC,
            Self::MessageTooLarge { .. } => errno::EPERM,
            Self::BufferTooSmall { .. } => errno::EMSGSIZE,
            Self::BadAddress => errno::EFAULT,
            Self::OutOfMemory => errno::ENOMEM,
            Self::WouldBlock => errno::EAGAIN,
            Self::Cancelled => errno::EINTR,
            Self::InvalidArgument => errno::EINVAL,
            Self::UnsupportedOperation(_) => errno::ENOTTY,
            Self::NoSuchSlot(_) => errno::ENXIO,
            Self::ShutDown => errno::ESHUTDOWN,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno() {
        assert_eq!(Error::SlotFull.errno(), errno::ENOSPC);
        assert_eq!(Error::MessageTooLarge { size: 257, max: 256 }.errno(), errno::EPERM);
        assert_eq!(Error::BufferTooSmall { size: 12, available: 11 }.errno(), errno::EMSGSIZE);
        assert_eq!(Error::WouldBlock.errno(), errno::EAGAIN);
        assert_eq!(Error::Cancelled.errno(), errno::EINTR);
        assert_eq!(Error::UnsupportedOperation(42).errno(), errno::ENOTTY);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::MessageTooLarge { size: 257, max: 256 }.to_string(),
            "Message size (257) greater than the max allowed by the slot (256)"
        );
        assert_eq!(Error::UnsupportedOperation(42).to_string(), "Unsupported command code 0x2a");
    }
}
