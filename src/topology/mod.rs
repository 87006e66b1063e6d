//! Topology value types shared by every component.

pub mod model;

pub use model::{NULL_TARGET, PipelineDefinition, ServiceDefinition, ServiceNode};
