//! Shared fixtures for the end-to-end workflow tests

#![allow(dead_code)]

use async_trait::async_trait;
use cinephage_core::{
    AddDownload, AddedDownload, ClientItem, DownloadClient, DownloadPayload, ImportOutcome,
    ImportService, MemoryStore, Protocol, QueueItem, Release, Result,
};
use cinephage_decision::builtin::default_formats;
use cinephage_decision::{DelaySpec, FormatRegistry, ProfileRegistry, Scorer, SharedFormats};
use cinephage_indexers::{
    CacheConfig, IndexerAdapter, IndexerCooldowns, IndexerDefinition, OrchestratorConfig,
    RateLimitConfig, RateLimiterRegistry, SearchCriteria, SearchOrchestrator, SearchResultCache,
};
use cinephage_monitoring::{GrabConfig, GrabService, TaskDeps};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const GB: i64 = 1024 * 1024 * 1024;

/// Indexer stub with canned results and a call counter
pub struct StubIndexer {
    definition: IndexerDefinition,
    releases: Mutex<Vec<Release>>,
    pub calls: AtomicUsize,
}

impl StubIndexer {
    pub fn new(id: i32, name: &str, base_url: &str) -> Self {
        Self {
            definition: IndexerDefinition::new(id, name, base_url),
            releases: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_releases(self, releases: Vec<Release>) -> Self {
        *self.releases.lock().unwrap() = releases;
        self
    }

    pub fn set_releases(&self, releases: Vec<Release>) {
        *self.releases.lock().unwrap() = releases;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerAdapter for StubIndexer {
    fn definition(&self) -> &IndexerDefinition {
        &self.definition
    }

    async fn search(
        &self,
        _criteria: &SearchCriteria,
        _token: &CancellationToken,
    ) -> Result<Vec<Release>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.releases.lock().unwrap().clone())
    }

    async fn download(&self, _release: &Release) -> Result<DownloadPayload> {
        Ok(DownloadPayload::Magnet {
            uri: "magnet:?xt=urn:btih:stub".to_string(),
        })
    }
}

/// Download client stub that records what was dispatched
pub struct RecordingClient {
    pub added: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            added: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn added_titles(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadClient for RecordingClient {
    fn id(&self) -> &str {
        "recording"
    }

    fn name(&self) -> &str {
        "Recording Client"
    }

    async fn add(&self, request: AddDownload) -> Result<AddedDownload> {
        self.added.lock().unwrap().push(request.title);
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AddedDownload {
            download_id: format!("dl-{}", id),
            info_hash: None,
        })
    }

    async fn list(&self) -> Result<Vec<ClientItem>> {
        Ok(Vec::new())
    }

    async fn remove(&self, _download_id: &str, _delete_files: bool) -> Result<()> {
        Ok(())
    }

    async fn pause(&self, _download_id: &str) -> Result<()> {
        Ok(())
    }

    async fn resume(&self, _download_id: &str) -> Result<()> {
        Ok(())
    }
}

pub struct PassthroughImport;

#[async_trait]
impl ImportService for PassthroughImport {
    async fn import(&self, item: &QueueItem) -> Result<ImportOutcome> {
        Ok(ImportOutcome {
            imported: true,
            files: vec![format!("/library/{}.mkv", item.title)],
            error: None,
        })
    }
}

/// A fully wired world over the in-memory store
pub struct World {
    pub store: Arc<MemoryStore>,
    pub profiles: Arc<ProfileRegistry>,
    pub formats: Arc<SharedFormats>,
    pub limiter: Arc<RateLimiterRegistry>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub client: Arc<RecordingClient>,
    pub grab: Arc<GrabService>,
    pub deps: Arc<TaskDeps>,
}

impl World {
    pub fn scorer(&self) -> Scorer {
        Scorer::new(self.formats.get())
    }
}

pub fn world() -> World {
    world_with_host_limit(RateLimitConfig {
        requests: 30,
        period_secs: 60,
        burst: 5,
    })
}

pub fn world_with_host_limit(host_limit: RateLimitConfig) -> World {
    let store = Arc::new(MemoryStore::new());
    let profiles = Arc::new(ProfileRegistry::builtin());
    let formats = Arc::new(SharedFormats::new(
        FormatRegistry::build(default_formats()).expect("builtin formats compile"),
    ));

    let limiter = Arc::new(RateLimiterRegistry::new(host_limit));
    let cache = Arc::new(SearchResultCache::new(CacheConfig::default()));
    let cooldowns = Arc::new(IndexerCooldowns::default());
    let orchestrator = Arc::new(SearchOrchestrator::new(
        OrchestratorConfig::default(),
        limiter.clone(),
        cache,
        cooldowns,
        formats.clone(),
    ));

    let client = Arc::new(RecordingClient::new());
    let grab = Arc::new(
        GrabService::new(
            GrabConfig {
                category: Some("cinephage".to_string()),
                client_url: "http://downloads.internal:8080".to_string(),
            },
            store.clone(),
            store.clone(),
            store.clone(),
            DelaySpec::new(store.clone()),
            client.clone(),
            limiter.clone(),
        )
        .with_orchestrator(orchestrator.clone()),
    );

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

    World {
        store,
        profiles,
        formats,
        limiter,
        orchestrator,
        client,
        grab,
        deps,
    }
}

pub fn torrent_release(
    title: &str,
    indexer_id: i32,
    indexer: &str,
    size: i64,
    seeders: i32,
) -> Release {
    Release::new(title, indexer_id, indexer, Protocol::Torrent, size)
        .with_seeders(seeders)
        .with_magnet_url(format!("magnet:?xt=urn:btih:{}", title.len()))
}
