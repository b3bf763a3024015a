//! In-memory store implementing every repository trait

use crate::domain::repositories::*;
use crate::error::{CinephageError, Result};
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct StoreInner {
    movies: HashMap<Uuid, Movie>,
    series: HashMap<Uuid, Series>,
    seasons: HashMap<(Uuid, i32), Season>,
    episodes: HashMap<Uuid, Episode>,
    queue: HashMap<Uuid, QueueItem>,
    pending: HashMap<Uuid, PendingRelease>,
    blocklist: HashMap<Uuid, BlocklistEntry>,
    history_items: Vec<MonitoringHistory>,
    task_runs: HashMap<Uuid, TaskHistory>,
    cooldowns: HashMap<(String, TaskType), SearchCooldown>,
    delay_profiles: HashMap<Uuid, DelayProfile>,
    settings: MonitoringSettings,
}

impl StoreInner {
    /// Cascading monitoring check across series -> season -> episode
    fn episode_effectively_monitored(&self, episode: &Episode) -> bool {
        let Some(series) = self.series.get(&episode.series_id) else {
            return false;
        };
        let Some(season) = self
            .seasons
            .get(&(episode.series_id, episode.season_number))
        else {
            return false;
        };
        episode.is_effectively_monitored(series, season)
    }
}

/// Tables-as-records store backed by `tokio::sync::RwLock` maps
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MovieRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Movie>> {
        Ok(self.inner.read().await.movies.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Movie>> {
        Ok(self.inner.read().await.movies.values().cloned().collect())
    }

    async fn find_monitored_missing(&self) -> Result<Vec<Movie>> {
        Ok(self
            .inner
            .read()
            .await
            .movies
            .values()
            .filter(|m| m.monitored && !m.has_file)
            .cloned()
            .collect())
    }

    async fn find_monitored_with_file(&self) -> Result<Vec<Movie>> {
        Ok(self
            .inner
            .read()
            .await
            .movies
            .values()
            .filter(|m| m.monitored && m.has_file)
            .cloned()
            .collect())
    }

    async fn upsert(&self, movie: &Movie) -> Result<()> {
        self.inner
            .write()
            .await
            .movies
            .insert(movie.id, movie.clone());
        Ok(())
    }

    async fn set_file(&self, id: Uuid, file: Option<MediaFile>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let movie = inner
            .movies
            .get_mut(&id)
            .ok_or_else(|| CinephageError::NotFound {
                resource: format!("movie {}", id),
            })?;
        movie.has_file = file.is_some();
        movie.existing_file = file;
        movie.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SeriesRepository for MemoryStore {
    async fn get_series(&self, id: Uuid) -> Result<Option<Series>> {
        Ok(self.inner.read().await.series.get(&id).cloned())
    }

    async fn get_season(&self, series_id: Uuid, number: i32) -> Result<Option<Season>> {
        Ok(self
            .inner
            .read()
            .await
            .seasons
            .get(&(series_id, number))
            .cloned())
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
        Ok(self.inner.read().await.episodes.get(&id).cloned())
    }

    async fn list_series(&self) -> Result<Vec<Series>> {
        Ok(self.inner.read().await.series.values().cloned().collect())
    }

    async fn episodes_for_series(&self, series_id: Uuid) -> Result<Vec<Episode>> {
        Ok(self
            .inner
            .read()
            .await
            .episodes
            .values()
            .filter(|e| e.series_id == series_id)
            .cloned()
            .collect())
    }

    async fn find_monitored_missing_episodes(&self) -> Result<Vec<Episode>> {
        let inner = self.inner.read().await;
        Ok(inner
            .episodes
            .values()
            .filter(|e| !e.has_file && inner.episode_effectively_monitored(e))
            .cloned()
            .collect())
    }

    async fn find_monitored_episodes_with_file(&self) -> Result<Vec<Episode>> {
        let inner = self.inner.read().await;
        Ok(inner
            .episodes
            .values()
            .filter(|e| e.has_file && inner.episode_effectively_monitored(e))
            .cloned()
            .collect())
    }

    async fn find_monitored_aired_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Episode>> {
        let inner = self.inner.read().await;
        Ok(inner
            .episodes
            .values()
            .filter(|e| {
                e.air_date
                    .map(|aired| aired >= from && aired <= to)
                    .unwrap_or(false)
                    && inner.episode_effectively_monitored(e)
            })
            .cloned()
            .collect())
    }

    async fn upsert_series(&self, series: &Series) -> Result<()> {
        self.inner
            .write()
            .await
            .series
            .insert(series.id, series.clone());
        Ok(())
    }

    async fn upsert_season(&self, season: &Season) -> Result<()> {
        self.inner
            .write()
            .await
            .seasons
            .insert((season.series_id, season.number), season.clone());
        Ok(())
    }

    async fn upsert_episode(&self, episode: &Episode) -> Result<()> {
        self.inner
            .write()
            .await
            .episodes
            .insert(episode.id, episode.clone());
        Ok(())
    }

    async fn set_episode_file(&self, id: Uuid, file: Option<MediaFile>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let episode = inner
            .episodes
            .get_mut(&id)
            .ok_or_else(|| CinephageError::NotFound {
                resource: format!("episode {}", id),
            })?;
        episode.has_file = file.is_some();
        episode.existing_file = file;
        Ok(())
    }
}

#[async_trait]
impl QueueRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<QueueItem>> {
        Ok(self.inner.read().await.queue.get(&id).cloned())
    }

    async fn list(&self, status: Option<QueueStatus>) -> Result<Vec<QueueItem>> {
        Ok(self
            .inner
            .read()
            .await
            .queue
            .values()
            .filter(|item| status.map(|s| item.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn find_active(&self) -> Result<Vec<QueueItem>> {
        Ok(self
            .inner
            .read()
            .await
            .queue
            .values()
            .filter(|item| item.is_active())
            .cloned()
            .collect())
    }

    async fn find_by_download_id(
        &self,
        client_id: &str,
        download_id: &str,
    ) -> Result<Option<QueueItem>> {
        Ok(self
            .inner
            .read()
            .await
            .queue
            .values()
            .find(|item| {
                item.download_client_id == client_id
                    && item.download_id.as_deref() == Some(download_id)
            })
            .cloned())
    }

    async fn insert(&self, item: &QueueItem) -> Result<()> {
        self.inner.write().await.queue.insert(item.id, item.clone());
        Ok(())
    }

    async fn update(&self, item: &QueueItem) -> Result<()> {
        self.inner.write().await.queue.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.write().await.queue.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PendingReleaseRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<PendingRelease>> {
        Ok(self.inner.read().await.pending.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<PendingRelease>> {
        Ok(self.inner.read().await.pending.values().cloned().collect())
    }

    async fn find_pending_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Option<PendingRelease>> {
        let key = content.key();
        Ok(self
            .inner
            .read()
            .await
            .pending
            .values()
            .find(|p| p.status == PendingStatus::Pending && p.content.key() == key)
            .cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<PendingRelease>> {
        Ok(self
            .inner
            .read()
            .await
            .pending
            .values()
            .filter(|p| p.is_due(now))
            .cloned()
            .collect())
    }

    async fn insert(&self, pending: &PendingRelease) -> Result<()> {
        let mut inner = self.inner.write().await;
        if pending.status == PendingStatus::Pending {
            let key = pending.content.key();
            let duplicate = inner
                .pending
                .values()
                .any(|p| p.status == PendingStatus::Pending && p.content.key() == key);
            if duplicate {
                return Err(CinephageError::ValidationError {
                    field: "pending_release".to_string(),
                    message: "a pending release already exists for this content".to_string(),
                });
            }
        }
        inner.pending.insert(pending.id, pending.clone());
        Ok(())
    }

    async fn update(&self, pending: &PendingRelease) -> Result<()> {
        self.inner
            .write()
            .await
            .pending
            .insert(pending.id, pending.clone());
        Ok(())
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.pending.len();
        inner.pending.retain(|_, p| p.created_at >= cutoff);
        Ok((before - inner.pending.len()) as u64)
    }
}

#[async_trait]
impl BlocklistRepository for MemoryStore {
    async fn insert(&self, entry: &BlocklistEntry) -> Result<()> {
        self.inner
            .write()
            .await
            .blocklist
            .insert(entry.id, entry.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BlocklistEntry>> {
        Ok(self.inner.read().await.blocklist.values().cloned().collect())
    }

    async fn is_blocked(&self, release: &Release, content: &ContentRef) -> Result<bool> {
        Ok(self.find_match(release, content).await?.is_some())
    }

    async fn find_match(
        &self,
        release: &Release,
        content: &ContentRef,
    ) -> Result<Option<BlocklistEntry>> {
        let now = Utc::now();
        Ok(self
            .inner
            .read()
            .await
            .blocklist
            .values()
            .find(|entry| entry.matches(release, content, now))
            .cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.blocklist.len();
        inner.blocklist.retain(|_, entry| entry.is_live(now));
        Ok((before - inner.blocklist.len()) as u64)
    }
}

#[async_trait]
impl HistoryRepository for MemoryStore {
    async fn record_item(&self, row: &MonitoringHistory) -> Result<()> {
        self.inner.write().await.history_items.push(row.clone());
        Ok(())
    }

    async fn start_task_run(&self, run: &TaskHistory) -> Result<()> {
        self.inner
            .write()
            .await
            .task_runs
            .insert(run.id, run.clone());
        Ok(())
    }

    async fn finish_task_run(&self, run: &TaskHistory) -> Result<()> {
        self.inner
            .write()
            .await
            .task_runs
            .insert(run.id, run.clone());
        Ok(())
    }

    async fn items_for_run(&self, task_history_id: Uuid) -> Result<Vec<MonitoringHistory>> {
        Ok(self
            .inner
            .read()
            .await
            .history_items
            .iter()
            .filter(|row| row.task_history_id == task_history_id)
            .cloned()
            .collect())
    }

    async fn recent_runs(&self, task_type: TaskType, limit: usize) -> Result<Vec<TaskHistory>> {
        let inner = self.inner.read().await;
        let mut runs: Vec<TaskHistory> = inner
            .task_runs
            .values()
            .filter(|run| run.task_type == task_type)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

#[async_trait]
impl SearchCooldownRepository for MemoryStore {
    async fn get(&self, content: &ContentRef, task: TaskType) -> Result<Option<SearchCooldown>> {
        Ok(self
            .inner
            .read()
            .await
            .cooldowns
            .get(&(content.key(), task))
            .cloned())
    }

    async fn set(&self, cooldown: &SearchCooldown) -> Result<()> {
        self.inner
            .write()
            .await
            .cooldowns
            .insert((cooldown.content.key(), cooldown.task_type), cooldown.clone());
        Ok(())
    }
}

#[async_trait]
impl DelayProfileRepository for MemoryStore {
    async fn list_enabled(&self) -> Result<Vec<DelayProfile>> {
        let mut profiles: Vec<DelayProfile> = self
            .inner
            .read()
            .await
            .delay_profiles
            .values()
            .filter(|p| p.enabled)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.sort_order);
        Ok(profiles)
    }

    async fn upsert(&self, profile: &DelayProfile) -> Result<()> {
        self.inner
            .write()
            .await
            .delay_profiles
            .insert(profile.id, profile.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn monitoring(&self) -> Result<MonitoringSettings> {
        Ok(self.inner.read().await.settings.clone())
    }

    async fn update_monitoring(&self, settings: &MonitoringSettings) -> Result<()> {
        self.inner.write().await.settings = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::release::Protocol;
    use chrono::Duration;

    fn release(title: &str) -> Release {
        Release::new(title, 1, "alpha", Protocol::Torrent, 4_000_000_000)
    }

    #[tokio::test]
    async fn single_pending_row_per_content_key() {
        let store = MemoryStore::new();
        let content = ContentRef::movie(Uuid::new_v4());
        let now = Utc::now();

        let first = PendingRelease::new(
            release("Movie.2024.1080p.WEB-DL-GROUP"),
            content.clone(),
            "best",
            100,
            now + Duration::hours(1),
        );
        PendingReleaseRepository::insert(&store, &first)
            .await
            .unwrap();

        let second = PendingRelease::new(
            release("Movie.2024.2160p.REMUX-GROUP"),
            content.clone(),
            "best",
            900,
            now + Duration::hours(1),
        );
        assert!(PendingReleaseRepository::insert(&store, &second)
            .await
            .is_err());

        // superseding the first row makes room for the second
        let mut old = store.find_pending_for_content(&content).await.unwrap().unwrap();
        old.mark_superseded(second.id);
        PendingReleaseRepository::update(&store, &old).await.unwrap();
        PendingReleaseRepository::insert(&store, &second)
            .await
            .unwrap();

        let live = store.find_pending_for_content(&content).await.unwrap().unwrap();
        assert_eq!(live.id, second.id);
    }

    #[tokio::test]
    async fn monitored_missing_episodes_respect_cascade() {
        let store = MemoryStore::new();
        let series = Series::new(100, "Show", "best");
        let mut season1 = Season::new(series.id, 1);
        let season2 = Season::new(series.id, 2);
        season1.monitored = false;

        let ep1 = Episode::new(series.id, 1, 1);
        let ep2 = Episode::new(series.id, 2, 1);

        store.upsert_series(&series).await.unwrap();
        store.upsert_season(&season1).await.unwrap();
        store.upsert_season(&season2).await.unwrap();
        store.upsert_episode(&ep1).await.unwrap();
        store.upsert_episode(&ep2).await.unwrap();

        let missing = store.find_monitored_missing_episodes().await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, ep2.id);
    }

    #[tokio::test]
    async fn blocklist_expiry_purge() {
        let store = MemoryStore::new();
        let content = ContentRef::movie(Uuid::new_v4());
        let blocked = release("Movie.2024.1080p.CAM-GROUP");
        let now = Utc::now();

        let entry = BlocklistEntry::new(&blocked, content.clone(), BlockReason::DownloadFailed)
            .with_expiry(now - Duration::minutes(1));
        BlocklistRepository::insert(&store, &entry).await.unwrap();

        assert!(!store.is_blocked(&blocked, &content).await.unwrap());
        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(BlocklistRepository::list(&store).await.unwrap().is_empty());
    }
}
