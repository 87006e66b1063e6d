//! Accessors consumed by outer surfaces (HTTP handlers, views, CLI).

use crate::error::{RegistryResult, Result};
use crate::registry::PipelineRegistry;
use crate::render::pipeline_to_mermaid;
use crate::sync::ConfigSync;
use crate::topology::{ServiceDefinition, ServiceNode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// What an index page needs: the active pipeline, every pipeline name, and the active services
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub active_pipeline: Option<String>,
    pub pipeline_names: BTreeSet<String>,
    pub services: BTreeMap<String, ServiceNode>,
}

#[derive(Clone)]
pub struct TopologyApi {
    registry: Arc<PipelineRegistry>,
    sync: Option<Arc<ConfigSync>>,
}

impl TopologyApi {
    pub fn new(registry: Arc<PipelineRegistry>) -> Self {
        Self {
            registry,
            sync: None,
        }
    }

    /// Publish mutations to the store through `sync`
    pub fn with_sync(mut self, sync: Arc<ConfigSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn registry(&self) -> &Arc<PipelineRegistry> {
        &self.registry
    }

    pub fn active_services(&self) -> RegistryResult<BTreeMap<String, ServiceNode>> {
        Ok(self.registry.get_active_pipeline()?.services.clone())
    }

    /// Active pipeline's service mapping as JSON
    pub fn active_services_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.active_services()?)?)
    }

    /// Add or replace a service in the active pipeline.
    ///
    /// Returns the stub services created for unknown forward targets. A store
    /// write failure is logged; the local update stands.
    pub async fn add_service(&self, definition: ServiceDefinition) -> Result<BTreeSet<String>> {
        let (pipeline, created) = self
            .registry
            .add_or_update_active_service(ServiceNode::from(definition))?;
        info!(
            "Service added to pipeline '{}', auto-created: {:?}",
            pipeline, created
        );

        if let Some(sync) = &self.sync {
            if let Err(e) = sync.publish(&pipeline).await {
                warn!("Failed to publish pipeline '{}': {}", pipeline, e);
            }
        }
        Ok(created)
    }

    /// Mermaid diagram of the active pipeline
    pub fn active_diagram(&self) -> Result<String> {
        let pipeline = self.registry.get_active_pipeline()?;
        Ok(pipeline_to_mermaid(&pipeline)?)
    }

    /// Switch the active pipeline; unknown names are ignored
    pub fn select_pipeline(&self, name: &str) -> bool {
        self.registry.set_active(name)
    }

    /// Overview of the registry; `services` is empty when nothing is active
    pub fn overview(&self) -> Overview {
        let active = self.registry.get_active_pipeline().ok();
        Overview {
            active_pipeline: active.as_ref().map(|p| p.name.clone()),
            pipeline_names: self.registry.list_pipeline_names(),
            services: active.map(|p| p.services.clone()).unwrap_or_default(),
        }
    }
}
