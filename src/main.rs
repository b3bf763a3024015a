//! Cinephage - unified application entry point
//!
//! Composition root: constructs the store, registries and services, wires
//! them together in dependency order, and runs until interrupted. Indexer
//! and download-client adapters are registered here; none ship with the
//! core, so the placeholders below fail loudly until real adapters are
//! wired in.

use async_trait::async_trait;
use cinephage_core::{
    AddDownload, AddedDownload, CinephageError, ClientItem, DownloadClient, ImportOutcome,
    ImportService, MemoryStore, QueueItem, Result as CoreResult, ServiceManager, WorkerManager,
    WorkerManagerConfig,
};
use cinephage_decision::builtin::default_formats;
use cinephage_decision::{DelaySpec, FormatRegistry, ProfileRegistry, SharedFormats};
use cinephage_indexers::{
    CacheConfig, IndexerCooldowns, OrchestratorConfig, RateLimiterRegistry, SearchOrchestrator,
    SearchResultCache,
};
use cinephage_monitoring::{
    DownloadLifecycle, DownloadLifecycleService, GrabConfig, GrabService, LifecycleConfig,
    MissingContentTask, MonitoringScheduler, MonitoringTask, NewEpisodeTask, PendingReleaseTask,
    TaskDeps, UpgradeTask,
};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cinephage", version, about = "Personal media automation core")]
struct Cli {
    /// Tracing filter, e.g. "info" or "cinephage=debug"
    #[arg(long, default_value = "info", env = "CINEPHAGE_LOG")]
    log: String,

    /// Category assigned to dispatched downloads
    #[arg(long, default_value = "cinephage")]
    category: String,

    /// Download client URL; its host keys the dispatch rate bucket
    #[arg(long, default_value = "http://localhost:8080", env = "CINEPHAGE_CLIENT_URL")]
    client_url: String,
}

/// Stands in until a real download-client adapter is registered. Every
/// dispatch fails loudly instead of silently dropping grabs.
struct UnconfiguredClient;

#[async_trait]
impl DownloadClient for UnconfiguredClient {
    fn id(&self) -> &str {
        "unconfigured"
    }

    fn name(&self) -> &str {
        "Unconfigured Client"
    }

    async fn add(&self, request: AddDownload) -> CoreResult<AddedDownload> {
        Err(CinephageError::DownloadClientError {
            client: "unconfigured".to_string(),
            message: format!(
                "no download client configured, cannot dispatch '{}'",
                request.title
            ),
        })
    }

    async fn list(&self) -> CoreResult<Vec<ClientItem>> {
        Ok(Vec::new())
    }

    async fn remove(&self, _download_id: &str, _delete_files: bool) -> CoreResult<()> {
        Ok(())
    }

    async fn pause(&self, _download_id: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn resume(&self, _download_id: &str) -> CoreResult<()> {
        Ok(())
    }
}

/// Stands in until the import pipeline is registered
struct UnconfiguredImport;

#[async_trait]
impl ImportService for UnconfiguredImport {
    async fn import(&self, item: &QueueItem) -> CoreResult<ImportOutcome> {
        warn!(title = %item.title, "no import pipeline configured");
        Ok(ImportOutcome {
            imported: false,
            files: Vec::new(),
            error: Some("import pipeline not configured".to_string()),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;

    info!("starting cinephage");

    // storage and registries
    let store = Arc::new(MemoryStore::new());
    let formats = Arc::new(SharedFormats::new(FormatRegistry::build(default_formats())?));
    let profiles = Arc::new(ProfileRegistry::builtin());

    // search stack
    let limiter = Arc::new(RateLimiterRegistry::default());
    let cache = Arc::new(SearchResultCache::new(CacheConfig::default()));
    let cooldowns = Arc::new(IndexerCooldowns::default());
    let orchestrator = Arc::new(SearchOrchestrator::new(
        OrchestratorConfig::default(),
        limiter.clone(),
        cache.clone(),
        cooldowns,
        formats.clone(),
    ));
    // indexer adapters register here once their definitions are loaded
    if orchestrator.adapter_count() == 0 {
        warn!("no indexer adapters registered; searches will return nothing");
    }

    // download side
    let client: Arc<dyn DownloadClient> = Arc::new(UnconfiguredClient);
    let import: Arc<dyn ImportService> = Arc::new(UnconfiguredImport);
    let grab = Arc::new(GrabService::new(
        GrabConfig {
            category: Some(cli.category),
            client_url: cli.client_url,
        },
        store.clone(),
        store.clone(),
        store.clone(),
        DelaySpec::new(store.clone()),
        client.clone(),
        limiter.clone(),
    )
    .with_orchestrator(orchestrator.clone()));

    // monitoring tasks
    let deps = Arc::new(TaskDeps {
        movies: store.clone(),
        series: store.clone(),
        pending: store.clone(),
        blocklist: store.clone(),
        history: store.clone(),
        cooldowns: store.clone(),
        settings: store.clone(),
        profiles: profiles.clone(),
        formats: formats.clone(),
        orchestrator: orchestrator.clone(),
        grab: grab.clone(),
    });
    let tasks: Vec<Arc<dyn MonitoringTask>> = vec![
        Arc::new(MissingContentTask::new(deps.clone())),
        Arc::new(UpgradeTask::new(deps.clone(), false)),
        Arc::new(UpgradeTask::new(deps.clone(), true)),
        Arc::new(NewEpisodeTask::new(deps.clone())),
        Arc::new(PendingReleaseTask::new(deps.clone())),
    ];

    let scheduler = Arc::new(MonitoringScheduler::new(
        store.clone(),
        store.clone(),
        tasks,
    ));
    let lifecycle = DownloadLifecycle::new(
        LifecycleConfig::default(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        vec![client],
        import,
    );

    // worker framework: hosts user-triggered task runs
    // (scheduler.trigger_now) and enforces per-type concurrency caps
    let workers = Arc::new(WorkerManager::new(WorkerManagerConfig::default()));
    {
        let workers = workers.clone();
        tokio::spawn(async move {
            workers.run_gc_loop().await;
        });
    }

    // services start in dependency order and stop in reverse
    let mut services = ServiceManager::new();
    services.register(Arc::new(DownloadLifecycleService::new(lifecycle)));
    services.register(scheduler);

    // cache expiry sweep rides on the shutdown token
    let sweep_token = services.shutdown_token().child_token();
    let sweep_cache = cache.clone();
    tokio::spawn(async move {
        sweep_cache.run_sweep_loop(sweep_token).await;
    });

    services.start_all()?;
    for (name, status) in services.statuses() {
        info!(service = %name, status = %status, "service state");
    }

    signal::ctrl_c().await?;
    info!("shutdown requested");
    workers.shutdown();
    services.stop_all().await;
    info!("shutdown complete");

    Ok(())
}

fn init_logging(filter: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}
