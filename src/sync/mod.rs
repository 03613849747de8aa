mod event;
mod signal;

pub(crate) use event::{Condition, Parked};
pub(crate) use signal::{Cancel, Signal};
