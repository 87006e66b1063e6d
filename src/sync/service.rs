use crate::config::SyncSettings;
use crate::error::{RegistryError, Result, StoreError, StoreResult};
use crate::registry::{PipelineRegistry, Replacement};
use crate::sync::store::KvStore;
use crate::topology::PipelineDefinition;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Outcome of one seeding pass, by pipeline name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub written: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

/// Outcome of one refresh pass, by pipeline name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    /// Written locally while the store value was in flight; left for the next pass
    pub changed_locally: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

/// Keeps a [`PipelineRegistry`] and a [`KvStore`] in step.
///
/// Store failures are logged and never surface past this type; the registry
/// keeps whatever it held before the failed call.
pub struct ConfigSync {
    registry: Arc<PipelineRegistry>,
    store: Arc<dyn KvStore>,
    settings: SyncSettings,
}

impl ConfigSync {
    pub fn new(
        registry: Arc<PipelineRegistry>,
        store: Arc<dyn KvStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            registry,
            store,
            settings,
        }
    }

    async fn bounded<T, F>(&self, key: &str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let after = self.settings.call_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_| StoreError::Timeout {
                key: key.to_string(),
                after,
            })?
    }

    /// Write every local pipeline whose key is absent from the store.
    ///
    /// Keys that already exist are left alone, including ones a peer creates
    /// concurrently.
    pub async fn seed(&self) -> SeedReport {
        let mut report = SeedReport::default();

        for (name, pipeline) in self.registry.snapshot() {
            let key = self.settings.key_for(&name);
            let created = match encode(&pipeline) {
                Ok(value) => {
                    self.bounded(&key, self.store.put_if_absent(&key, &value))
                        .await
                }
                Err(e) => Err(e),
            };
            match created {
                Ok(true) => {
                    info!("Seeded pipeline '{}' into store key '{}'", name, key);
                    report.written.insert(name);
                }
                Ok(false) => {
                    debug!("Store already holds '{}', not seeding", key);
                    report.skipped.insert(name);
                }
                Err(e) => {
                    warn!(
                        "Failed to seed pipeline '{}', keeping in-memory state: {}",
                        name, e
                    );
                    report.failed.insert(name);
                }
            }
        }

        report
    }

    /// Write the current local version of one pipeline to the store
    pub async fn publish(&self, name: &str) -> Result<()> {
        let pipeline = self
            .registry
            .get_pipeline(name)
            .ok_or_else(|| RegistryError::unknown_pipeline(name))?;
        let key = self.settings.key_for(name);
        self.write(&key, &pipeline).await?;
        debug!("Published pipeline '{}' to '{}'", name, key);
        Ok(())
    }

    async fn write(&self, key: &str, pipeline: &PipelineDefinition) -> StoreResult<()> {
        let value = encode(pipeline)?;
        self.bounded(key, self.store.put(key, &value)).await
    }

    /// Pull every known or listed pipeline key and replace changed pipelines.
    ///
    /// Each replacement is atomic per pipeline; pipelines the store lacks are kept.
    /// A pipeline written locally while its value was being fetched is not replaced.
    pub async fn refresh(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut names = self.registry.list_pipeline_names();

        let prefix = &self.settings.key_prefix;
        match self.bounded(prefix, self.store.keys(prefix)).await {
            Ok(keys) => {
                names.extend(
                    keys.iter()
                        .filter_map(|key| self.settings.name_for(key))
                        .map(str::to_string),
                );
            }
            Err(e) => warn!("Unable to list store keys, refreshing known pipelines only: {}", e),
        }

        for name in names {
            let key = self.settings.key_for(&name);
            let read = self.registry.get_pipeline(&name);
            match self.fetch(&key).await {
                Ok(Some(mut pipeline)) => {
                    if pipeline.name != name {
                        debug!(
                            "Store value under '{}' names pipeline '{}', using key name",
                            key, pipeline.name
                        );
                        pipeline.name = name.clone();
                    }
                    match self
                        .registry
                        .replace_pipeline_if_unchanged(read.as_ref(), pipeline)
                    {
                        Replacement::Updated => {
                            info!("Refreshed pipeline '{}' from store", name);
                            report.updated.insert(name);
                        }
                        Replacement::Unchanged => {
                            report.unchanged.insert(name);
                        }
                        Replacement::ChangedLocally => {
                            info!(
                                "Pipeline '{}' changed locally during refresh, keeping local version",
                                name
                            );
                            report.changed_locally.insert(name);
                        }
                    }
                }
                Ok(None) => {
                    debug!("Store has no value for '{}'", key);
                    report.missing.insert(name);
                }
                Err(e) => {
                    warn!("Failed to refresh pipeline '{}': {}", name, e);
                    report.failed.insert(name);
                }
            }
        }

        report
    }

    async fn fetch(&self, key: &str) -> StoreResult<Option<PipelineDefinition>> {
        let Some(raw) = self.bounded(key, self.store.get(key)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::decode(key, e.to_string()))
    }

    /// Seed once, then refresh on every tick or trigger until shut down
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let (trigger, triggers) = mpsc::channel(8);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(triggers, shutdown_rx));
        SyncHandle {
            trigger,
            shutdown,
            task,
        }
    }

    async fn run(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::select! {
            report = self.seed() => {
                info!(
                    "Seed finished: {} written, {} already present, {} failed",
                    report.written.len(),
                    report.skipped.len(),
                    report.failed.len()
                );
            }
            _ = shutdown.changed() => {
                debug!("Config sync stopped during seed");
                return;
            }
        }

        let period = self.settings.refresh_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => debug!("Periodic refresh"),
                Some(()) = triggers.recv() => debug!("Triggered refresh"),
            }

            tokio::select! {
                report = self.refresh() => {
                    if !report.updated.is_empty() || !report.failed.is_empty() {
                        info!(
                            "Refresh finished: updated {:?}, failed {:?}",
                            report.updated, report.failed
                        );
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Config sync stopped");
    }
}

fn encode(pipeline: &PipelineDefinition) -> StoreResult<String> {
    serde_json::to_string(pipeline).map_err(|e| StoreError::encode(e.to_string()))
}

/// Control handle for a spawned [`ConfigSync`] loop
pub struct SyncHandle {
    trigger: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Request a refresh. Returns `false` if one is already queued or the loop has stopped.
    pub fn trigger(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    /// Stop the loop, dropping any in-flight store call, and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Config sync task ended abnormally: {}", e);
        }
    }
}
