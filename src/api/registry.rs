//! The fixed table of slots.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::endpoint::Endpoint;
use crate::{
    error::{Error, Result},
    observe::SlotObserver,
    protocol::{BASE_ID, DEFAULT_MAX_MSG_SIZE, INSTANCES, MAX_SLOT_SIZE, SlotId, validate_max_message_size},
    slot::{Slot, SlotConfig},
};

/// A fixed-size table of slots, addressed by identifier.
///
/// Every slot is created when the registry is built and lives as long as the
/// registry or any [`Endpoint`] opened on it. Identifiers run from
/// [`base_id()`](`Registry::base_id`) to `base_id() + len() - 1`.
///
/// Dropping the registry shuts it down.
pub struct Registry {
    slots: Box<[Arc<Slot>]>,
    base_id: SlotId,
    token: CancellationToken,
}

impl Registry {
    /// Opens a session on slot `id`.
    ///
    /// Fails with [`Error::NoSuchSlot`] if `id` is out of range, and with
    /// [`Error::ShutDown`] once the registry has been shut down.
    pub fn open(&self, id: SlotId) -> Result<Endpoint> {
        if self.is_shut_down() {
            tracing::debug!(slot = id, "open on a shut down registry");
            return Err(Error::ShutDown);
        }
        let slot = self.slot(id).ok_or_else(|| {
            tracing::debug!(slot = id, "open on a missing slot");
            Error::NoSuchSlot(id)
        })?;

        Ok(Endpoint::new(slot.clone(), self.token.child_token()))
    }

    /// Returns the slot registered under `id`, if any.
    pub fn slot(&self, id: SlotId) -> Option<&Arc<Slot>> {
        let index = id.checked_sub(self.base_id)?;
        self.slots.get(usize::try_from(index).ok()?)
    }

    /// Number of slots in the registry.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn base_id(&self) -> SlotId {
        self.base_id
    }

    /// Shuts the registry down.
    ///
    /// Every blocking operation waiting on any slot fails with
    /// [`Error::Cancelled`], further operations on open endpoints fail with
    /// [`Error::ShutDown`] and [`open()`](`Registry::open`) is rejected.
    /// Queued messages are released once the last endpoint is dropped.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            tracing::info!(slots = self.slots.len(), "shutting down registry");
            self.token.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for configuring and creating a [`Registry`].
pub struct RegistryBuilder {
    instances: usize,
    base_id: SlotId,
    default_max_message_size: usize,
    capacity: usize,
    observer: Option<Arc<dyn SlotObserver>>,
    #[cfg(test)]
    fail_at: Option<SlotId>,
}

impl RegistryBuilder {
    /// Sets the number of slots.
    ///
    /// Default: 256
    #[must_use]
    pub fn instances(mut self, instances: usize) -> Self {
        self.instances = instances;
        self
    }

    /// Sets the identifier of the first slot.
    ///
    /// Default: 0
    #[must_use]
    pub fn base_id(mut self, base_id: SlotId) -> Self {
        self.base_id = base_id;
        self
    }

    /// Sets the maximum message size every slot starts with.
    ///
    /// Default: 256 bytes (max: 512 bytes)
    #[must_use]
    pub fn default_max_message_size(mut self, size: usize) -> Self {
        self.default_max_message_size = size;
        self
    }

    /// Sets the maximum number of messages a slot can hold.
    ///
    /// Default: 64 messages
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the observer notified of every slot mutation.
    ///
    /// Default: none
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn SlotObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Makes the creation of slot `id` fail.
    #[cfg(test)]
    fn fail_at(mut self, id: SlotId) -> Self {
        self.fail_at = Some(id);
        self
    }

    /// Builds the registry, creating every slot.
    ///
    /// Fails with [`Error::InvalidArgument`] on an out of range setting and
    /// with [`Error::OutOfMemory`] if the slots cannot be allocated. On failure
    /// every slot created so far is released.
    pub fn build(self) -> Result<Registry> {
        let Self {
            instances,
            base_id,
            default_max_message_size,
            capacity,
            observer,
            #[cfg(test)]
            fail_at,
        } = self;

        let max_message_size = i64::try_from(default_max_message_size)
            .map_err(|_| Error::InvalidArgument)
            .and_then(validate_max_message_size)?;
        if capacity == 0 {
            return Err(Error::InvalidArgument);
        }
        // The last identifier must be addressable
        let count = SlotId::try_from(instances).map_err(|_| Error::InvalidArgument)?;
        base_id
            .checked_add(count.saturating_sub(1))
            .ok_or(Error::InvalidArgument)?;

        let config = SlotConfig {
            capacity,
            max_message_size,
            observer,
            #[cfg(test)]
            fail_at,
        };

        let mut slots = Vec::new();
        slots.try_reserve_exact(instances).map_err(|_| Error::OutOfMemory)?;
        for id in (0..count).map(|i| base_id + i) {
            // Early return drops the slots created so far
            slots.push(Arc::new(Slot::try_new(id, &config)?));
        }

        tracing::info!(instances, base_id, capacity, max_message_size, "registry created");
        Ok(Registry {
            slots: slots.into_boxed_slice(),
            base_id,
            token: CancellationToken::new(),
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        registry()
    }
}

/// Creates a builder for a [`Registry`] with the default settings.
///
/// ```
/// let registry = mailslot::registry().instances(8).base_id(100).build().unwrap();
/// assert_eq!(registry.len(), 8);
/// assert!(registry.open(107).is_ok());
/// assert_eq!(registry.open(108).err(), Some(mailslot::Error::NoSuchSlot(108)));
/// ```
pub fn registry() -> RegistryBuilder {
    RegistryBuilder {
        instances: INSTANCES,
        base_id: BASE_ID,
        default_max_message_size: DEFAULT_MAX_MSG_SIZE,
        capacity: MAX_SLOT_SIZE,
        observer: None,
        #[cfg(test)]
        fail_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{SlotEvent, SlotEventKind, tests::Recorder};

    #[test]
    fn test_defaults() {
        let registry = registry().build().unwrap();
        assert_eq!(registry.len(), INSTANCES);
        assert_eq!(registry.base_id(), BASE_ID);

        for id in [0, 1, 255] {
            assert_eq!(registry.slot(id).unwrap().id(), id);
        }
        assert!(registry.slot(256).is_none());

        let queue = registry.slot(0).unwrap().try_lock().unwrap();
        assert_eq!(queue.capacity(), MAX_SLOT_SIZE);
        assert_eq!(queue.max_message_size(), DEFAULT_MAX_MSG_SIZE);
    }

    #[test]
    fn test_addressing() {
        let registry = registry().instances(4).base_id(10).build().unwrap();

        assert!(registry.slot(9).is_none());
        assert_eq!(registry.slot(10).unwrap().id(), 10);
        assert_eq!(registry.slot(13).unwrap().id(), 13);
        assert!(registry.slot(14).is_none());

        assert_eq!(registry.open(12).unwrap().slot_id(), 12);
        assert_eq!(registry.open(0).err(), Some(Error::NoSuchSlot(0)));
        assert_eq!(registry.open(14).err(), Some(Error::NoSuchSlot(14)));
    }

    #[test]
    fn test_invalid_config() {
        for builder in [
            registry().default_max_message_size(0),
            registry().default_max_message_size(513),
            registry().capacity(0),
            registry().base_id(SlotId::MAX).instances(2),
        ] {
            assert_eq!(builder.build().err(), Some(Error::InvalidArgument));
        }

        let registry = registry().default_max_message_size(512).capacity(1).instances(0).build().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shutdown() {
        let registry = registry().instances(1).build().unwrap();
        let endpoint = registry.open(0).unwrap();
        assert_eq!(endpoint.try_write(b"ciao"), Ok(4));

        registry.shutdown();
        assert!(registry.is_shut_down());
        assert_eq!(registry.open(0).err(), Some(Error::ShutDown));
        assert_eq!(endpoint.try_write(b"ciao"), Err(Error::ShutDown));

        // Idempotent
        registry.shutdown();
    }

    #[test]
    fn test_teardown() {
        let recorder = Arc::new(Recorder::default());
        let registry = registry().instances(2).observer(recorder.clone()).build().unwrap();

        let endpoint = registry.open(1).unwrap();
        endpoint.try_write(b"ciao").unwrap();
        endpoint.try_write(b"mondo").unwrap();
        drop(registry);

        // Slot 0 is gone, slot 1 is kept alive by the endpoint
        assert_eq!(
            recorder.events().last(),
            Some(&SlotEvent {
                slot: 0,
                kind: SlotEventKind::Destroyed { dropped: 0 },
                count: 0
            })
        );

        drop(endpoint);
        assert_eq!(
            recorder.events().last(),
            Some(&SlotEvent {
                slot: 1,
                kind: SlotEventKind::Destroyed { dropped: 2 },
                count: 0
            })
        );
    }

    #[test]
    fn test_out_of_memory() {
        assert_eq!(registry().capacity(usize::MAX).build().err(), Some(Error::OutOfMemory));
    }

    #[test]
    fn test_failed_build_releases_slots() {
        let recorder = Arc::new(Recorder::default());
        let res = registry()
            .instances(4)
            .base_id(10)
            .observer(recorder.clone())
            .fail_at(12)
            .build();
        assert_eq!(res.err(), Some(Error::OutOfMemory));

        // Slots created before the failure are destroyed, later ones never exist
        let destroyed = |slot| SlotEvent {
            slot,
            kind: SlotEventKind::Destroyed { dropped: 0 },
            count: 0,
        };
        assert_eq!(recorder.events(), vec![destroyed(10), destroyed(11)]);
    }
}
