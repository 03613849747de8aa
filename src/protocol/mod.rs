pub(crate) mod core;

pub use self::core::*;

/// Default upper bound on the size of a single message, in bytes.
pub const DEFAULT_MAX_MSG_SIZE: usize = 256;

/// Ceiling of the configurable maximum message size, in bytes.
pub const LIMIT_MAX_MSG_SIZE: usize = 512;

/// Maximum number of messages a slot can hold.
pub const MAX_SLOT_SIZE: usize = 64;

/// Number of independently addressable slots in a registry.
pub const INSTANCES: usize = 256;

/// Identifier of the first slot in a registry.
pub const BASE_ID: u32 = 0;

/// Stable identifier of a slot.
pub type SlotId = u32;
