/// Centralized error handling for pipetopo
pub mod bootstrap;
pub mod registry;
pub mod render;
pub mod store;
pub mod topology;

pub use bootstrap::{BootstrapError, BootstrapResult};
pub use registry::{RegistryError, RegistryResult};
pub use render::{RenderError, RenderResult};
pub use store::{StoreError, StoreResult};
pub use topology::{Result, TopologyError};
