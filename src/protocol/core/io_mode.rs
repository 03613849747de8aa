/// I/O mode of a session on a slot.
///
/// Determines what a read or write does when it cannot make progress right
/// away: either the slot lock is held by someone else, the slot is full (write)
/// or the slot is empty (read).
///
/// The mode is a per-session setting: two [`Endpoint`](`crate::Endpoint`)s
/// opened on the same slot may use different modes concurrently.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum IoMode {
    /// Blocking mode - Park the caller until the operation can complete.
    ///
    /// **This is the default mode.** Writers wait for space, readers wait for a
    /// message and both wait for the slot lock. A parked operation is resumed
    /// when the opposite role completes a transfer, or terminated with
    /// [`Error::Cancelled`](`crate::Error::Cancelled`) when the session is
    /// interrupted or the registry shuts down.
    Blocking = 0,

    /// Non-blocking mode - Fail instead of waiting.
    ///
    /// Operations never suspend the caller, not even on lock contention or
    /// while allocating message storage. Whenever the operation would have to
    /// wait it fails with [`Error::WouldBlock`](`crate::Error::WouldBlock`).
    NonBlocking = 1,
}

impl Default for IoMode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl IoMode {
    /// Default I/O mode (Blocking)
    pub const DEFAULT: Self = Self::Blocking;

    /// Maps the `O_NONBLOCK`-style flag to a mode.
    pub const fn from_nonblocking(non_blocking: bool) -> Self {
        if non_blocking { Self::NonBlocking } else { Self::Blocking }
    }

    pub const fn is_nonblocking(&self) -> bool {
        matches!(self, Self::NonBlocking)
    }

    #[cfg(test)]
    pub(crate) fn rand() -> Self {
        Self::from_nonblocking(rand::random_bool(0.5))
    }
}
