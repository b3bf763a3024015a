//! Domain repositories
//!
//! Repository traits that abstract over the persistence engine. The engine
//! itself is an external collaborator; an in-memory implementation lives in
//! `crate::store` for the binary and for tests.

use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository for movie library items
#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Movie>>;

    async fn list(&self) -> Result<Vec<Movie>>;

    /// Monitored movies without a file
    async fn find_monitored_missing(&self) -> Result<Vec<Movie>>;

    /// Monitored movies that already have a file (upgrade candidates)
    async fn find_monitored_with_file(&self) -> Result<Vec<Movie>>;

    async fn upsert(&self, movie: &Movie) -> Result<()>;

    /// Attach or clear the imported file
    async fn set_file(&self, id: Uuid, file: Option<MediaFile>) -> Result<()>;
}

/// Repository for series, seasons and episodes.
///
/// The `find_monitored_*` queries enforce the cascading monitoring
/// invariant: an episode counts as monitored only when the series, its
/// season, and the episode itself are all monitored.
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    async fn get_series(&self, id: Uuid) -> Result<Option<Series>>;

    async fn get_season(&self, series_id: Uuid, number: i32) -> Result<Option<Season>>;

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>>;

    async fn list_series(&self) -> Result<Vec<Series>>;

    async fn episodes_for_series(&self, series_id: Uuid) -> Result<Vec<Episode>>;

    async fn find_monitored_missing_episodes(&self) -> Result<Vec<Episode>>;

    async fn find_monitored_episodes_with_file(&self) -> Result<Vec<Episode>>;

    /// Monitored episodes whose air date falls within `[from, to]`
    async fn find_monitored_aired_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Episode>>;

    async fn upsert_series(&self, series: &Series) -> Result<()>;

    async fn upsert_season(&self, season: &Season) -> Result<()>;

    async fn upsert_episode(&self, episode: &Episode) -> Result<()>;

    async fn set_episode_file(&self, id: Uuid, file: Option<MediaFile>) -> Result<()>;
}

/// Repository for downloads in flight
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<QueueItem>>;

    async fn list(&self, status: Option<QueueStatus>) -> Result<Vec<QueueItem>>;

    /// All items that still need polling (non-terminal)
    async fn find_active(&self) -> Result<Vec<QueueItem>>;

    async fn find_by_download_id(
        &self,
        client_id: &str,
        download_id: &str,
    ) -> Result<Option<QueueItem>>;

    async fn insert(&self, item: &QueueItem) -> Result<()>;

    async fn update(&self, item: &QueueItem) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Repository for the pending-release delay queue.
///
/// Implementations must uphold the single-pending invariant: at most one
/// `Pending` row per content key. `insert` fails when a pending row for the
/// same key already exists; callers supersede the old row first.
#[async_trait]
pub trait PendingReleaseRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<PendingRelease>>;

    async fn list(&self) -> Result<Vec<PendingRelease>>;

    /// The live pending row for a content key, if any
    async fn find_pending_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Option<PendingRelease>>;

    /// Pending rows whose `process_at` has passed
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<PendingRelease>>;

    async fn insert(&self, pending: &PendingRelease) -> Result<()>;

    async fn update(&self, pending: &PendingRelease) -> Result<()>;

    /// Drop rows created before `cutoff` regardless of status; returns the
    /// number removed
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Repository for the blocklist
#[async_trait]
pub trait BlocklistRepository: Send + Sync {
    async fn insert(&self, entry: &BlocklistEntry) -> Result<()>;

    async fn list(&self) -> Result<Vec<BlocklistEntry>>;

    /// Whether any live entry matches the release for this content
    async fn is_blocked(&self, release: &Release, content: &ContentRef) -> Result<bool>;

    async fn find_match(
        &self,
        release: &Release,
        content: &ContentRef,
    ) -> Result<Option<BlocklistEntry>>;

    /// Remove expired entries; returns the number removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Repository for monitoring and task-run history
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Record one item outcome. Item rows are committed before the run
    /// summary is finished.
    async fn record_item(&self, row: &MonitoringHistory) -> Result<()>;

    async fn start_task_run(&self, run: &TaskHistory) -> Result<()>;

    async fn finish_task_run(&self, run: &TaskHistory) -> Result<()>;

    async fn items_for_run(&self, task_history_id: Uuid) -> Result<Vec<MonitoringHistory>>;

    async fn recent_runs(&self, task_type: TaskType, limit: usize) -> Result<Vec<TaskHistory>>;
}

/// Repository for per-item search cooldowns
#[async_trait]
pub trait SearchCooldownRepository: Send + Sync {
    async fn get(&self, content: &ContentRef, task: TaskType) -> Result<Option<SearchCooldown>>;

    async fn set(&self, cooldown: &SearchCooldown) -> Result<()>;
}

/// Repository for delay profiles
#[async_trait]
pub trait DelayProfileRepository: Send + Sync {
    /// Enabled profiles ordered by `sort_order`; the first is applied
    async fn list_enabled(&self) -> Result<Vec<DelayProfile>>;

    async fn upsert(&self, profile: &DelayProfile) -> Result<()>;
}

/// Repository for settings
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn monitoring(&self) -> Result<MonitoringSettings>;

    async fn update_monitoring(&self, settings: &MonitoringSettings) -> Result<()>;
}
