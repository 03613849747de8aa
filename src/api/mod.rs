mod endpoint;
mod registry;

pub use endpoint::{Endpoint, Interrupter};
pub use registry::{Registry, RegistryBuilder, registry};
