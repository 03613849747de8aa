use std::fmt;

use crate::{
    error::{Error, Result},
    protocol::IoMode,
};

/// A message stored in a slot.
///
/// The payload is copied in when the message is created and never mutated
/// afterwards. Its length is the message size.
pub(crate) struct Message {
    content: Box<[u8]>,
}

impl Message {
    /// Copies the first `size` bytes of `src` into a new message.
    ///
    /// Storage is reserved with a fallible allocation: a failure is reported
    /// as [`Error::WouldBlock`] in non-blocking mode and [`Error::OutOfMemory`]
    /// otherwise. A source shorter than `size` fails with [`Error::BadAddress`].
    pub(crate) fn try_new(src: &[u8], size: usize, mode: IoMode) -> Result<Self> {
        let mut content = Vec::new();
        content.try_reserve_exact(size).map_err(|_| match mode {
            IoMode::NonBlocking => Error::WouldBlock,
            IoMode::Blocking => Error::OutOfMemory,
        })?;

        let src = src.get(..size).ok_or(Error::BadAddress)?;
        content.extend_from_slice(src);

        Ok(Self {
            content: content.into_boxed_slice(),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.content.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.content
    }

    /// Copies the whole payload at the beginning of `dst`.
    ///
    /// Fails with [`Error::BadAddress`] without touching `dst` when it cannot
    /// hold the payload.
    pub(crate) fn copy_to(&self, dst: &mut [u8]) -> Result<usize> {
        let dst = dst.get_mut(..self.size()).ok_or(Error::BadAddress)?;
        dst.copy_from_slice(&self.content);
        Ok(self.size())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_slice()))
    }
}
