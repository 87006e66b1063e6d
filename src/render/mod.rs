//! Deterministic diagram rendering of a pipeline topology.

pub mod mermaid;

pub use mermaid::{NodeCategory, node_id, pipeline_to_mermaid};
