//! Pipeline topology registry, bootstrap parser, store sync and diagram renderer.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod render;
pub mod sync;
pub mod topology;

pub use api::{Overview, TopologyApi};
pub use error::{Result, TopologyError};
pub use registry::PipelineRegistry;
pub use topology::{PipelineDefinition, ServiceDefinition, ServiceNode};
