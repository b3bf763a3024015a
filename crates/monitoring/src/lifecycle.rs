//! Download lifecycle
//!
//! Polls every download client on a fixed interval, diffs live state into
//! queue rows, pushes completed downloads through the import collaborator,
//! and blocklists what fails. A periodic orphan sweep reconciles the
//! client's torrent set against the queue.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use cinephage_core::{
    BackgroundService, BlockReason, BlocklistEntry, BlocklistRepository, ClientItem,
    ClientItemStatus, ContentRef, DownloadClient, ImportService, MediaFile, MovieRepository,
    QueueItem, QueueRepository, QueueStatus, Release, Result, SeriesRepository, ServiceStatus,
    StatusCell,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub poll_interval: Duration,
    pub orphan_interval: Duration,
    /// Orphan sweep only reports what it would remove
    pub orphan_dry_run: bool,
    /// TTL on blocklist entries created for failed downloads/imports
    pub failure_blocklist_hours: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            orphan_interval: Duration::from_secs(600),
            orphan_dry_run: true,
            failure_blocklist_hours: 24,
        }
    }
}

pub struct DownloadLifecycle {
    config: LifecycleConfig,
    queue: Arc<dyn QueueRepository>,
    movies: Arc<dyn MovieRepository>,
    series: Arc<dyn SeriesRepository>,
    blocklist: Arc<dyn BlocklistRepository>,
    clients: Vec<Arc<dyn DownloadClient>>,
    import: Arc<dyn ImportService>,
    status: StatusCell,
}

impl DownloadLifecycle {
    pub fn new(
        config: LifecycleConfig,
        queue: Arc<dyn QueueRepository>,
        movies: Arc<dyn MovieRepository>,
        series: Arc<dyn SeriesRepository>,
        blocklist: Arc<dyn BlocklistRepository>,
        clients: Vec<Arc<dyn DownloadClient>>,
        import: Arc<dyn ImportService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            queue,
            movies,
            series,
            blocklist,
            clients,
            import,
            status: StatusCell::new(),
        })
    }

    /// One polling pass over every client; returns the number of queue rows
    /// that changed.
    pub async fn poll_once(&self) -> Result<usize> {
        let mut changed = 0;
        for client in &self.clients {
            match self.sync_client(client.as_ref()).await {
                Ok(count) => changed += count,
                Err(err) => {
                    // transient client errors: keep polling, try again next tick
                    warn!(client = client.name(), error = %err, "client poll failed");
                }
            }
        }
        Ok(changed)
    }

    async fn sync_client(&self, client: &dyn DownloadClient) -> Result<usize> {
        let live: HashMap<String, ClientItem> = client
            .list()
            .await?
            .into_iter()
            .map(|item| (item.download_id.clone(), item))
            .collect();

        let mut changed = 0;
        let active = self.queue.find_active().await?;
        for mut item in active {
            if item.download_client_id != client.id() {
                continue;
            }
            let Some(download_id) = item.download_id.clone() else {
                continue;
            };

            match live.get(&download_id) {
                Some(client_item) => {
                    if self.apply_client_state(&mut item, client_item).await? {
                        self.queue.update(&item).await?;
                        changed += 1;
                    }
                }
                None => {
                    // gone from the client: removed by the user or another tool
                    info!(title = %item.title, "download vanished from client, marking removed");
                    item.transition(QueueStatus::Removed);
                    self.queue.update(&item).await?;
                    changed += 1;
                }
            }
        }

        // drive imports for everything that just completed
        for item in self.queue.list(Some(QueueStatus::Completed)).await? {
            if item.download_client_id == client.id() {
                self.run_import(item).await?;
                changed += 1;
            }
        }

        Ok(changed)
    }

    /// Diff one client item into the queue row. Returns whether anything
    /// changed.
    async fn apply_client_state(
        &self,
        item: &mut QueueItem,
        client_item: &ClientItem,
    ) -> Result<bool> {
        let old_status = item.status;
        let old_progress = item.progress;

        item.update_stats(
            client_item.progress,
            client_item.download_speed,
            client_item.upload_speed,
            client_item.eta_seconds,
            client_item.ratio,
        );

        match client_item.status {
            ClientItemStatus::Downloading => {
                item.transition(QueueStatus::Downloading);
            }
            ClientItemStatus::Paused => {
                item.transition(QueueStatus::Paused);
            }
            ClientItemStatus::Completed => {
                // finished download: 100% and seeding or stopped
                if item.transition(QueueStatus::Completed) {
                    info!(title = %item.title, "download completed");
                }
            }
            ClientItemStatus::Failed => {
                let message = client_item
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "download client reported an error".to_string());
                warn!(title = %item.title, error = %message, "download failed in client");
                self.blocklist_item(item, BlockReason::DownloadFailed, &message)
                    .await?;
                item.set_error(message);
            }
            ClientItemStatus::Queued => {}
        }

        Ok(item.status != old_status || (item.progress - old_progress).abs() > f64::EPSILON)
    }

    /// Import a completed download; retries up to the attempt cap, then
    /// fails the item onto the blocklist.
    async fn run_import(&self, mut item: QueueItem) -> Result<()> {
        if !item.transition(QueueStatus::Importing) {
            return Ok(());
        }
        self.queue.update(&item).await?;

        let import_result = self.import.import(&item).await;
        match import_result {
            Ok(outcome) if outcome.imported => {
                item.transition(QueueStatus::Imported);
                self.queue.update(&item).await?;
                self.attach_file(&item).await?;
                info!(title = %item.title, files = outcome.files.len(), "import finished");
            }
            other => {
                let message = match other {
                    Ok(outcome) => outcome
                        .error
                        .unwrap_or_else(|| "import did not produce any files".to_string()),
                    Err(err) => err.to_string(),
                };
                item.record_import_failure(message.clone());

                if item.import_attempts_exhausted() {
                    error!(title = %item.title, error = %message, "import failed permanently");
                    self.blocklist_item(&item, BlockReason::ImportFailed, &message)
                        .await?;
                    item.transition(QueueStatus::Failed);
                } else {
                    warn!(
                        title = %item.title,
                        attempt = item.import_attempts,
                        error = %message,
                        "import failed, will retry"
                    );
                    // back to completed so the next poll retries
                    item.transition(QueueStatus::Completed);
                }
                self.queue.update(&item).await?;
            }
        }
        Ok(())
    }

    /// Record the imported file on the library item(s)
    async fn attach_file(&self, item: &QueueItem) -> Result<()> {
        // score under the current profile is recomputed on demand
        let file = MediaFile::new(item.title.clone(), item.size_bytes, None);
        match &item.content {
            ContentRef::Movie { movie_id } => {
                self.movies.set_file(*movie_id, Some(file)).await?;
            }
            ContentRef::Episodes { episode_ids, .. } => {
                for episode_id in episode_ids {
                    self.series
                        .set_episode_file(*episode_id, Some(file.clone()))
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn blocklist_item(
        &self,
        item: &QueueItem,
        reason: BlockReason,
        message: &str,
    ) -> Result<()> {
        let release = release_identity(item);
        let entry = BlocklistEntry::new(&release, item.content.clone(), reason)
            .with_message(message)
            .with_expiry(Utc::now() + ChronoDuration::hours(self.config.failure_blocklist_hours));
        self.blocklist.insert(&entry).await
    }

    /// Compare the clients' torrent sets to the queue; completed downloads
    /// with no matching row are orphans and can be pruned.
    pub async fn orphan_sweep(&self, dry_run: bool) -> Result<usize> {
        let mut orphans = 0;
        for client in &self.clients {
            for client_item in client.list().await? {
                if client_item.status != ClientItemStatus::Completed {
                    continue;
                }
                let known = self
                    .queue
                    .find_by_download_id(client.id(), &client_item.download_id)
                    .await?;
                if known.is_some() {
                    continue;
                }
                orphans += 1;
                if dry_run {
                    debug!(
                        client = client.name(),
                        name = %client_item.name,
                        "orphaned download (dry run, not removed)"
                    );
                } else {
                    info!(
                        client = client.name(),
                        name = %client_item.name,
                        "removing orphaned download"
                    );
                    client.remove(&client_item.download_id, false).await?;
                }
            }
        }
        Ok(orphans)
    }
}

/// The release identity persisted on a queue row, for blocklisting
fn release_identity(item: &QueueItem) -> Release {
    let mut release = Release::new(
        item.title.clone(),
        item.indexer_id,
        "",
        item.protocol,
        item.size_bytes,
    );
    release.info_hash = item.info_hash.clone();
    release
}

/// Wraps the `Arc<DownloadLifecycle>` handle so `BackgroundService` (foreign
/// trait) can be implemented without violating the orphan rule, which
/// disallows implementing a foreign trait directly on `Arc<T>`.
pub struct DownloadLifecycleService(Arc<DownloadLifecycle>);

impl DownloadLifecycleService {
    pub fn new(inner: Arc<DownloadLifecycle>) -> Self {
        Self(inner)
    }
}

#[async_trait]
impl BackgroundService for DownloadLifecycleService {
    fn name(&self) -> &str {
        "download-lifecycle"
    }

    fn status(&self) -> ServiceStatus {
        self.0.status.get()
    }

    fn start(&self, shutdown: CancellationToken) -> Result<()> {
        self.0.status.set(ServiceStatus::Starting);

        let lifecycle = self.0.clone();
        tokio::spawn(async move {
            let mut poll = tokio::time::interval(lifecycle.config.poll_interval);
            let mut orphan = tokio::time::interval(lifecycle.config.orphan_interval);
            // the first orphan tick fires immediately; skip it
            orphan.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = poll.tick() => {
                        if let Err(err) = lifecycle.poll_once().await {
                            error!(error = %err, "poll pass failed");
                        }
                    }
                    _ = orphan.tick() => {
                        match lifecycle.orphan_sweep(lifecycle.config.orphan_dry_run).await {
                            Ok(count) if count > 0 => {
                                info!(orphans = count, dry_run = lifecycle.config.orphan_dry_run, "orphan sweep finished");
                            }
                            Ok(_) => {}
                            Err(err) => error!(error = %err, "orphan sweep failed"),
                        }
                    }
                }
            }
        });

        self.0.status.set(ServiceStatus::Ready);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.0.status.set(ServiceStatus::Pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinephage_core::{
        AddDownload, AddedDownload, ImportOutcome, MemoryStore, Movie, Protocol,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FakeClient {
        items: Mutex<HashMap<String, ClientItem>>,
        removed: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn new() -> Self {
            Self {
                items: Mutex::new(HashMap::new()),
                removed: Mutex::new(Vec::new()),
            }
        }

        fn put(&self, download_id: &str, status: ClientItemStatus, progress: f64) {
            self.items.lock().unwrap().insert(
                download_id.to_string(),
                ClientItem {
                    download_id: download_id.to_string(),
                    info_hash: None,
                    name: "Test".to_string(),
                    status,
                    progress,
                    size_bytes: 4_000_000_000,
                    download_speed: 1_000_000,
                    upload_speed: 100_000,
                    eta_seconds: Some(600),
                    ratio: 0.1,
                    save_path: None,
                    error_message: match status {
                        ClientItemStatus::Failed => Some("tracker rejected".to_string()),
                        _ => None,
                    },
                },
            );
        }

        fn drop_item(&self, download_id: &str) {
            self.items.lock().unwrap().remove(download_id);
        }
    }

    #[async_trait]
    impl DownloadClient for FakeClient {
        fn id(&self) -> &str {
            "fake"
        }

        fn name(&self) -> &str {
            "Fake Client"
        }

        async fn add(&self, _request: AddDownload) -> Result<AddedDownload> {
            Ok(AddedDownload {
                download_id: "new".to_string(),
                info_hash: None,
            })
        }

        async fn list(&self) -> Result<Vec<ClientItem>> {
            Ok(self.items.lock().unwrap().values().cloned().collect())
        }

        async fn remove(&self, download_id: &str, _delete_files: bool) -> Result<()> {
            self.removed.lock().unwrap().push(download_id.to_string());
            self.items.lock().unwrap().remove(download_id);
            Ok(())
        }

        async fn pause(&self, _download_id: &str) -> Result<()> {
            Ok(())
        }

        async fn resume(&self, _download_id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeImport {
        fail_times: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeImport {
        fn succeeding() -> Self {
            Self {
                fail_times: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(times: usize) -> Self {
            Self {
                fail_times: AtomicUsize::new(times),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImportService for FakeImport {
        async fn import(&self, item: &QueueItem) -> Result<ImportOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Ok(ImportOutcome {
                    imported: false,
                    files: Vec::new(),
                    error: Some("no matching video file".to_string()),
                });
            }
            Ok(ImportOutcome {
                imported: true,
                files: vec![format!("/library/{}.mkv", item.title)],
                error: None,
            })
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        client: Arc<FakeClient>,
        lifecycle: Arc<DownloadLifecycle>,
        movie_id: Uuid,
        queue_id: Uuid,
    }

    async fn fixture(import: FakeImport) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(FakeClient::new());

        let movie = Movie::new(550, "Movie", "best");
        let movie_id = movie.id;
        store.upsert(&movie).await.unwrap();

        let item = QueueItem::new(
            "fake",
            "Movie.2024.1080p.WEB-DL-GROUP",
            ContentRef::movie(movie_id),
            Protocol::Torrent,
            1,
            4_000_000_000,
        )
        .with_download_id("dl-1");
        let queue_id = item.id;
        QueueRepository::insert(store.as_ref(), &item).await.unwrap();

        let lifecycle = DownloadLifecycle::new(
            LifecycleConfig::default(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            vec![client.clone()],
            Arc::new(import),
        );

        Fixture {
            store,
            client,
            lifecycle,
            movie_id,
            queue_id,
        }
    }

    async fn queue_item(fx: &Fixture) -> QueueItem {
        QueueRepository::get(fx.store.as_ref(), fx.queue_id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn download_progresses_to_imported() {
        let fx = fixture(FakeImport::succeeding()).await;

        fx.client.put("dl-1", ClientItemStatus::Downloading, 0.4);
        fx.lifecycle.poll_once().await.unwrap();
        let item = queue_item(&fx).await;
        assert_eq!(item.status, QueueStatus::Downloading);
        assert!((item.progress - 0.4).abs() < 1e-9);

        fx.client.put("dl-1", ClientItemStatus::Completed, 1.0);
        fx.lifecycle.poll_once().await.unwrap();
        let item = queue_item(&fx).await;
        assert_eq!(item.status, QueueStatus::Imported);

        // the library item now carries the imported file
        let movie = MovieRepository::get(fx.store.as_ref(), fx.movie_id)
            .await
            .unwrap()
            .unwrap();
        assert!(movie.has_file);
        assert_eq!(
            movie.existing_file.unwrap().scene_name,
            "Movie.2024.1080p.WEB-DL-GROUP"
        );
    }

    #[tokio::test]
    async fn import_retries_then_fails_onto_blocklist() {
        let fx = fixture(FakeImport::failing(10)).await;

        fx.client.put("dl-1", ClientItemStatus::Completed, 1.0);
        // each poll retries the import once
        for _ in 0..4 {
            fx.lifecycle.poll_once().await.unwrap();
        }

        let item = queue_item(&fx).await;
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.import_attempts, cinephage_core::MAX_IMPORT_ATTEMPTS);

        let entries = BlocklistRepository::list(fx.store.as_ref()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, BlockReason::ImportFailed);
        assert!(entries[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn client_failure_blocklists_and_fails() {
        let fx = fixture(FakeImport::succeeding()).await;

        fx.client.put("dl-1", ClientItemStatus::Failed, 0.2);
        fx.lifecycle.poll_once().await.unwrap();

        let item = queue_item(&fx).await;
        assert_eq!(item.status, QueueStatus::Failed);
        assert!(item.error_message.is_some());

        let entries = BlocklistRepository::list(fx.store.as_ref()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, BlockReason::DownloadFailed);
    }

    #[tokio::test]
    async fn vanished_download_marked_removed() {
        let fx = fixture(FakeImport::succeeding()).await;

        fx.client.put("dl-1", ClientItemStatus::Downloading, 0.5);
        fx.lifecycle.poll_once().await.unwrap();

        fx.client.drop_item("dl-1");
        fx.lifecycle.poll_once().await.unwrap();

        let item = queue_item(&fx).await;
        assert_eq!(item.status, QueueStatus::Removed);
    }

    #[tokio::test]
    async fn orphan_sweep_dry_run_and_removal() {
        let fx = fixture(FakeImport::succeeding()).await;

        // a completed torrent the queue knows nothing about
        fx.client.put("orphan-1", ClientItemStatus::Completed, 1.0);

        let found = fx.lifecycle.orphan_sweep(true).await.unwrap();
        assert_eq!(found, 1);
        assert!(fx.client.removed.lock().unwrap().is_empty());

        let removed = fx.lifecycle.orphan_sweep(false).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(fx.client.removed.lock().unwrap().as_slice(), ["orphan-1"]);
    }
}
