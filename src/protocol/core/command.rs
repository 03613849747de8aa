use super::IoMode;
use crate::{
    error::{Error, Result},
    protocol::LIMIT_MAX_MSG_SIZE,
};

/// Magic number of the slot control commands (`'x'`).
pub const IOCTL_MAGIC: u8 = b'x';

// _IOC layout: | dir (2) | size (14) | type (8) | nr (8) |
const IOC_WRITE: u32 = 1;
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;

const fn iow(ty: u8, nr: u8, size: usize) -> u32 {
    (IOC_WRITE << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

/// Raw code of the per-session "set non-blocking" command: `_IOW('x', 0, u32)`.
pub const SET_NONBLOCKING: u32 = iow(IOCTL_MAGIC, 0, size_of::<u32>());

/// Raw code of the per-slot "set max message size" command: `_IOW('x', 1, u32)`.
pub const SET_MAX_MSG_SIZE: u32 = iow(IOCTL_MAGIC, 1, size_of::<u32>());

/// Configuration command accepted by an [`Endpoint`](`crate::Endpoint`).
///
/// ```
/// use mailslot::{Command, Error, IoMode};
///
/// let cmd = Command::decode(mailslot::SET_NONBLOCKING, 1).unwrap();
/// assert_eq!(cmd, Command::SetNonBlocking(true));
///
/// assert_eq!(Command::decode(42, 0), Err(Error::UnsupportedOperation(42)));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switches the session between blocking and non-blocking I/O.
    SetNonBlocking(bool),
    /// Sets the maximum size of the messages accepted by the slot.
    ///
    /// The value is signed on purpose: a negative request is rejected with
    /// [`Error::InvalidArgument`] instead of wrapping to a huge size.
    SetMaxMessageSize(i64),
}

impl Command {
    /// Decodes a raw command code and its argument.
    pub fn decode(code: u32, arg: u64) -> Result<Self> {
        match code {
            SET_NONBLOCKING => Ok(Self::SetNonBlocking(arg != 0)),
            // The argument is carried as an unsigned word, reinterpret it so
            // that `-10` stays negative.
            SET_MAX_MSG_SIZE => Ok(Self::SetMaxMessageSize(arg as i64)),
            _ => Err(Error::UnsupportedOperation(code)),
        }
    }

    /// Encodes the command back to its raw code and argument.
    pub const fn encode(&self) -> (u32, u64) {
        match *self {
            Self::SetNonBlocking(nb) => (SET_NONBLOCKING, nb as u64),
            Self::SetMaxMessageSize(size) => (SET_MAX_MSG_SIZE, size as u64),
        }
    }

    /// Returns the mode a [`SetNonBlocking`](`Command::SetNonBlocking`) command selects.
    pub const fn io_mode(&self) -> Option<IoMode> {
        match *self {
            Self::SetNonBlocking(nb) => Some(IoMode::from_nonblocking(nb)),
            Self::SetMaxMessageSize(_) => None,
        }
    }
}

/// Validates a requested maximum message size: `0 < size <= LIMIT_MAX_MSG_SIZE`.
pub fn validate_max_message_size(size: i64) -> Result<usize> {
    match usize::try_from(size) {
        Ok(size) if (1..=LIMIT_MAX_MSG_SIZE).contains(&size) => Ok(size),
        _ => Err(Error::InvalidArgument),
    }
}
