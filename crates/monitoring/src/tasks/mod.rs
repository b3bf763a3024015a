//! Monitoring tasks
//!
//! Each task enumerates candidate library items, runs them through the
//! decision pipeline, and hands acceptable releases to the grab service.
//! One `MonitoringHistory` row is written per item considered; the
//! scheduler wraps every run in a `TaskHistory` summary.

pub mod missing;
pub mod new_episode;
pub mod pending;
mod support;
pub mod upgrade;

pub use missing::MissingContentTask;
pub use new_episode::NewEpisodeTask;
pub use pending::PendingReleaseTask;
pub use upgrade::UpgradeTask;

use crate::grab::GrabService;
use async_trait::async_trait;
use cinephage_core::{
    BlocklistRepository, HistoryRepository, MovieRepository, PendingReleaseRepository, Result,
    SearchCooldownRepository, SeriesRepository, SettingsRepository, TaskType,
};
use cinephage_decision::{ProfileRegistry, SharedFormats};
use cinephage_indexers::SearchOrchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything a task needs, wired once at composition time
pub struct TaskDeps {
    pub movies: Arc<dyn MovieRepository>,
    pub series: Arc<dyn SeriesRepository>,
    pub pending: Arc<dyn PendingReleaseRepository>,
    pub blocklist: Arc<dyn BlocklistRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub cooldowns: Arc<dyn SearchCooldownRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub profiles: Arc<ProfileRegistry>,
    pub formats: Arc<SharedFormats>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub grab: Arc<GrabService>,
}

/// Per-run summary counts for the task history row
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSummary {
    pub considered: u32,
    pub grabbed: u32,
    pub errored: u32,
}

impl TaskSummary {
    pub(crate) fn absorb(&mut self, result: &support::ItemResult) {
        self.considered += 1;
        match result {
            support::ItemResult::Grabbed => self.grabbed += 1,
            support::ItemResult::Errored => self.errored += 1,
            _ => {}
        }
    }
}

/// A periodically-run unit of monitoring work
#[async_trait]
pub trait MonitoringTask: Send + Sync {
    fn kind(&self) -> TaskType;

    async fn run(&self, run_id: Uuid, token: &CancellationToken) -> Result<TaskSummary>;
}
