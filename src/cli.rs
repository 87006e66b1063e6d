use crate::api::TopologyApi;
use crate::bootstrap::load_bootstrap_file;
use crate::config::{SyncSettings, constants};
use crate::registry::PipelineRegistry;
use crate::render::pipeline_to_mermaid;
use crate::sync::{ConfigSync, ConsulKvStore, KvStore};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Bootstrap source shared by every command
#[derive(Args, Debug, Clone)]
pub struct BootstrapArgs {
    /// Bootstrap properties file
    #[clap(short = 'f', long = "file", default_value = constants::BOOTSTRAP_FILE)]
    pub file: PathBuf,
    /// Pipeline to make active at startup
    #[clap(short = 'a', long, default_value = constants::DEFAULT_ACTIVE_PIPELINE)]
    pub active: String,
}

/// Key-value store connection
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Base URL of the Consul agent
    #[clap(long, default_value = constants::DEFAULT_STORE_URL)]
    pub store_url: String,
    /// Key namespace holding pipeline documents
    #[clap(long, default_value = constants::STORE_KEY_PREFIX)]
    pub key_prefix: String,
    /// Timeout of a single store call, in seconds
    #[clap(long, default_value_t = constants::STORE_CALL_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,
    /// Refresh period, in seconds
    #[clap(long, default_value_t = constants::REFRESH_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: u64,
}

impl StoreArgs {
    pub fn settings(&self) -> SyncSettings {
        SyncSettings::default()
            .with_store_url(self.store_url.clone())
            .with_key_prefix(self.key_prefix.clone())
            .with_call_timeout(Duration::from_secs(self.timeout_secs))
            .with_refresh_interval(Duration::from_secs(self.interval_secs))
    }
}

#[derive(Subcommand)]
#[command(version, about, long_about = None)]
pub enum Commands {
    /// Print the Mermaid diagram of a pipeline
    Render {
        #[command(flatten)]
        bootstrap: BootstrapArgs,
        /// Pipeline to render instead of the active one
        #[clap(short, long)]
        pipeline: Option<String>,
    },

    /// List pipelines and their services
    List {
        #[command(flatten)]
        bootstrap: BootstrapArgs,
    },

    /// Write bootstrap pipelines missing from the store, once
    Seed {
        #[command(flatten)]
        bootstrap: BootstrapArgs,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Seed, then keep refreshing from the store until Ctrl-C
    Sync {
        #[command(flatten)]
        bootstrap: BootstrapArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
}

impl Commands {
    /// Subcommand name, used to label the run's log file
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Render { .. } => "render",
            Commands::List { .. } => "list",
            Commands::Seed { .. } => "seed",
            Commands::Sync { .. } => "sync",
        }
    }
}

/// pipetopo Command
#[derive(Parser)]
#[command(about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Build the registry from the bootstrap file
pub async fn load_registry(
    args: &BootstrapArgs,
) -> Result<Arc<PipelineRegistry>, Box<dyn std::error::Error + Send + Sync>> {
    debug!("Bootstrap file: {:?}", args.file);
    let pipelines = load_bootstrap_file(&args.file).await?;
    Ok(Arc::new(PipelineRegistry::new(pipelines, args.active.clone())))
}

fn connect(
    registry: Arc<PipelineRegistry>,
    store: &StoreArgs,
) -> Result<Arc<ConfigSync>, Box<dyn std::error::Error + Send + Sync>> {
    let settings = store.settings();
    debug!("Store settings: {:?}", settings);
    let kv: Arc<dyn KvStore> = Arc::new(ConsulKvStore::new(&settings)?);
    Ok(Arc::new(ConfigSync::new(registry, kv, settings)))
}

pub async fn render_command(bootstrap: BootstrapArgs, pipeline: Option<String>) -> CommandResult {
    let registry = load_registry(&bootstrap).await?;
    let diagram = match pipeline {
        Some(name) => {
            let definition = registry
                .get_pipeline(&name)
                .ok_or_else(|| crate::error::RegistryError::unknown_pipeline(name))?;
            pipeline_to_mermaid(&definition)?
        }
        None => TopologyApi::new(registry).active_diagram()?,
    };
    print!("{diagram}");
    Ok(())
}

pub async fn list_command(bootstrap: BootstrapArgs) -> CommandResult {
    let registry = load_registry(&bootstrap).await?;
    let active = registry.active_pipeline_name();
    for (name, pipeline) in registry.snapshot() {
        let marker = if active.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!("{marker} {name}");
        for (service_name, service) in &pipeline.services {
            if service.is_stub() {
                println!("    {service_name} (stub)");
                continue;
            }
            println!(
                "    {} listen={:?} publish={:?} forward={:?}",
                service_name,
                service.kafka_listen_topics.as_deref().unwrap_or_default(),
                service.kafka_publish_topics.as_deref().unwrap_or_default(),
                service.grpc_forward_to.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

pub async fn seed_command(bootstrap: BootstrapArgs, store: StoreArgs) -> CommandResult {
    let registry = load_registry(&bootstrap).await?;
    let sync = connect(registry, &store)?;
    let report = sync.seed().await;
    info!(
        "Seeded {:?}, already present {:?}, failed {:?}",
        report.written, report.skipped, report.failed
    );
    Ok(())
}

pub async fn sync_command(bootstrap: BootstrapArgs, store: StoreArgs) -> CommandResult {
    let registry = load_registry(&bootstrap).await?;
    let sync = connect(Arc::clone(&registry), &store)?;
    let handle = sync.spawn();
    info!("Config sync running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }

    info!("Shutting down config sync...");
    handle.shutdown().await;
    info!(
        "Final registry holds {} pipelines, active: {:?}",
        registry.len(),
        registry.active_pipeline_name()
    );
    Ok(())
}
