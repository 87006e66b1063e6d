//! Thread-safe store of named pipelines plus the active-pipeline pointer.
//!
//! Every pipeline is held behind an `Arc` and replaced whole on mutation, so a
//! reader holding a snapshot never observes a half-applied update.

use crate::error::{RegistryError, RegistryResult};
use crate::topology::{PipelineDefinition, ServiceNode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RegistryState {
    pipelines: BTreeMap<String, Arc<PipelineDefinition>>,
    active: Option<String>,
}

impl RegistryState {
    /// Point at the preferred pipeline, else the first one, if nothing is active yet
    fn ensure_active(&mut self, preferred: &str) {
        if self.active.is_some() {
            return;
        }
        self.active = if self.pipelines.contains_key(preferred) {
            Some(preferred.to_string())
        } else {
            self.pipelines.keys().next().cloned()
        };
        if let Some(name) = &self.active {
            info!("Active pipeline set to '{}'", name);
        }
    }
}

/// Result of a conditional pipeline replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Updated,
    Unchanged,
    /// The registry was written after the caller read it
    ChangedLocally,
}

#[derive(Debug)]
pub struct PipelineRegistry {
    state: RwLock<RegistryState>,
    preferred_active: String,
}

impl PipelineRegistry {
    /// Create a registry from bootstrap output.
    ///
    /// `preferred_active` becomes the active pipeline when present; otherwise the
    /// lexicographically first pipeline is active.
    pub fn new(
        pipelines: BTreeMap<String, PipelineDefinition>,
        preferred_active: impl Into<String>,
    ) -> Self {
        let preferred_active = preferred_active.into();
        let mut state = RegistryState {
            pipelines: pipelines
                .into_iter()
                .map(|(name, mut pipeline)| {
                    pipeline.name = name.clone();
                    (name, Arc::new(pipeline.normalized()))
                })
                .collect(),
            active: None,
        };
        state.ensure_active(&preferred_active);
        debug!("Registry created with {} pipelines", state.pipelines.len());

        Self {
            state: RwLock::new(state),
            preferred_active,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names of every known pipeline
    pub fn list_pipeline_names(&self) -> BTreeSet<String> {
        self.read().pipelines.keys().cloned().collect()
    }

    pub fn get_pipeline(&self, name: &str) -> Option<Arc<PipelineDefinition>> {
        self.read().pipelines.get(name).cloned()
    }

    /// All pipelines as of one instant
    pub fn snapshot(&self) -> BTreeMap<String, Arc<PipelineDefinition>> {
        self.read().pipelines.clone()
    }

    pub fn active_pipeline_name(&self) -> Option<String> {
        self.read().active.clone()
    }

    pub fn get_active_pipeline(&self) -> RegistryResult<Arc<PipelineDefinition>> {
        let state = self.read();
        state
            .active
            .as_ref()
            .and_then(|name| state.pipelines.get(name))
            .cloned()
            .ok_or(RegistryError::NoActivePipeline)
    }

    /// Switch the active pipeline. Unknown names leave the pointer unchanged.
    ///
    /// Returns whether `name` is now active.
    pub fn set_active(&self, name: &str) -> bool {
        let mut state = self.write();
        if !state.pipelines.contains_key(name) {
            debug!("Ignoring request to activate unknown pipeline '{}'", name);
            return false;
        }
        if state.active.as_deref() != Some(name) {
            info!("Active pipeline set to '{}'", name);
            state.active = Some(name.to_string());
        }
        true
    }

    /// Insert or replace `node` in `pipeline`, creating stubs for unknown forward targets.
    ///
    /// Returns the names of the stubs that were created.
    pub fn add_or_update_service(
        &self,
        pipeline: &str,
        node: ServiceNode,
    ) -> RegistryResult<BTreeSet<String>> {
        validate_service(&node)?;
        let mut state = self.write();
        apply_service(&mut state, pipeline, node)
    }

    /// Same as [`add_or_update_service`](Self::add_or_update_service) against
    /// whichever pipeline is active at the time of the call.
    pub fn add_or_update_active_service(
        &self,
        node: ServiceNode,
    ) -> RegistryResult<(String, BTreeSet<String>)> {
        validate_service(&node)?;
        let mut state = self.write();
        let active = match &state.active {
            Some(name) if state.pipelines.contains_key(name) => name.clone(),
            _ => return Err(RegistryError::NoActivePipeline),
        };
        let created = apply_service(&mut state, &active, node)?;
        Ok((active, created))
    }

    pub fn contains_service(&self, pipeline: &str, service: &str) -> bool {
        self.read()
            .pipelines
            .get(pipeline)
            .is_some_and(|p| p.contains_service(service))
    }

    /// Swap in a whole pipeline, adding it if it is new.
    ///
    /// Returns `false` when the stored value already equals `pipeline`.
    pub fn replace_pipeline(&self, pipeline: PipelineDefinition) -> bool {
        let pipeline = pipeline.normalized();
        let mut state = self.write();
        self.swap_in(&mut state, pipeline) == Replacement::Updated
    }

    /// Swap in `pipeline` only if the registry still holds `expected` under its name.
    ///
    /// `expected` is the `Arc` read before the new value was fetched, or `None` if the
    /// pipeline was unknown then. Any write in between yields [`Replacement::ChangedLocally`]
    /// and leaves the registry untouched.
    pub fn replace_pipeline_if_unchanged(
        &self,
        expected: Option<&Arc<PipelineDefinition>>,
        pipeline: PipelineDefinition,
    ) -> Replacement {
        let pipeline = pipeline.normalized();
        let mut state = self.write();
        let current = state.pipelines.get(&pipeline.name);
        let untouched = match (expected, current) {
            (Some(expected), Some(current)) => Arc::ptr_eq(expected, current),
            (None, None) => true,
            _ => false,
        };
        if !untouched {
            debug!(
                "Pipeline '{}' changed locally since it was read, not replacing",
                pipeline.name
            );
            return Replacement::ChangedLocally;
        }
        self.swap_in(&mut state, pipeline)
    }

    fn swap_in(&self, state: &mut RegistryState, pipeline: PipelineDefinition) -> Replacement {
        if state
            .pipelines
            .get(&pipeline.name)
            .is_some_and(|current| **current == pipeline)
        {
            return Replacement::Unchanged;
        }
        debug!("Replacing pipeline '{}'", pipeline.name);
        state
            .pipelines
            .insert(pipeline.name.clone(), Arc::new(pipeline));
        state.ensure_active(&self.preferred_active);
        Replacement::Updated
    }

    pub fn len(&self) -> usize {
        self.read().pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().pipelines.is_empty()
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new(BTreeMap::new(), crate::config::constants::DEFAULT_ACTIVE_PIPELINE)
    }
}

fn validate_service(node: &ServiceNode) -> RegistryResult<()> {
    if node.name.is_empty() {
        return Err(RegistryError::invalid_service("service name must not be empty"));
    }
    Ok(())
}

fn apply_service(
    state: &mut RegistryState,
    pipeline: &str,
    node: ServiceNode,
) -> RegistryResult<BTreeSet<String>> {
    let current = state
        .pipelines
        .get(pipeline)
        .ok_or_else(|| RegistryError::unknown_pipeline(pipeline))?;

    let mut updated = PipelineDefinition::clone(current);
    let service_name = node.name.clone();
    let created: BTreeSet<String> = updated.upsert_service(node).into_iter().collect();
    state
        .pipelines
        .insert(pipeline.to_string(), Arc::new(updated));

    debug!(
        "Pipeline '{}': updated service '{}', created stubs {:?}",
        pipeline, service_name, created
    );
    Ok(created)
}
