//! Pending-release processor
//!
//! Dispatches delayed releases whose window has elapsed. Every due row is
//! re-verified first: content must still exist, still be monitored, still
//! be wanted, and not have been blocklisted while it waited.

use super::support;
use super::{MonitoringTask, TaskDeps, TaskSummary};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use cinephage_core::{
    BlockReason, ContentRef, HistoryStatus, MonitoringHistory, PendingRelease, Result, TaskType,
    MAX_PENDING_AGE_HOURS,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct PendingReleaseTask {
    deps: Arc<TaskDeps>,
}

impl PendingReleaseTask {
    pub fn new(deps: Arc<TaskDeps>) -> Self {
        Self { deps }
    }

    /// Content must still exist, be monitored, and (for non-upgrades) still
    /// lack a file.
    async fn still_wanted(&self, row: &PendingRelease) -> Result<bool> {
        let deps = &self.deps;
        match &row.content {
            ContentRef::Movie { movie_id } => {
                let Some(movie) = deps.movies.get(*movie_id).await? else {
                    return Ok(false);
                };
                if !movie.monitored {
                    return Ok(false);
                }
                Ok(row.is_upgrade || !movie.has_file)
            }
            ContentRef::Episodes { episode_ids, .. } => {
                for episode_id in episode_ids {
                    let Some(episode) = deps.series.get_episode(*episode_id).await? else {
                        continue;
                    };
                    let Some(item) = support::episode_item(deps, episode).await? else {
                        continue;
                    };
                    if item.is_monitored() && (row.is_upgrade || !item.has_file()) {
                        // one still-wanted episode keeps the pack alive
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn history_rows(&self, run_id: Uuid, row: &PendingRelease, status: HistoryStatus) -> Vec<MonitoringHistory> {
        match &row.content {
            ContentRef::Movie { movie_id } => {
                vec![MonitoringHistory::new(run_id, TaskType::PendingRelease, status)
                    .for_movie(*movie_id)]
            }
            ContentRef::Episodes { episode_ids, .. } => episode_ids
                .iter()
                .map(|id| {
                    MonitoringHistory::new(run_id, TaskType::PendingRelease, status)
                        .for_episode(*id)
                })
                .collect(),
        }
    }
}

#[async_trait]
impl MonitoringTask for PendingReleaseTask {
    fn kind(&self) -> TaskType {
        TaskType::PendingRelease
    }

    async fn run(&self, run_id: Uuid, token: &CancellationToken) -> Result<TaskSummary> {
        let deps = &self.deps;
        let now = Utc::now();
        let mut summary = TaskSummary::default();

        // drop ancient rows regardless of status
        let purged = deps
            .pending
            .purge_created_before(now - Duration::hours(MAX_PENDING_AGE_HOURS))
            .await?;
        if purged > 0 {
            debug!(purged, "purged stale pending releases");
        }

        let due = deps.pending.find_due(now).await?;
        for mut row in due {
            if token.is_cancelled() {
                return Ok(summary);
            }
            summary.considered += 1;

            if !self.still_wanted(&row).await? {
                row.mark_expired();
                deps.pending.update(&row).await?;
                for history in self.history_rows(run_id, &row, HistoryStatus::NoResults) {
                    support::record(deps, history.with_error("content no longer wanted")).await;
                }
                continue;
            }

            if deps
                .blocklist
                .is_blocked(&row.release, &row.content)
                .await?
            {
                row.mark_expired();
                deps.pending.update(&row).await?;
                for history in self.history_rows(run_id, &row, HistoryStatus::NoResults) {
                    support::record(deps, history.with_error("release blocklisted while pending"))
                        .await;
                }
                continue;
            }

            // dispatch without re-delaying
            match deps
                .grab
                .dispatch(&row.release, row.content.clone(), row.is_upgrade, token)
                .await
            {
                Ok(queue_item) => {
                    row.mark_grabbed();
                    deps.pending.update(&row).await?;
                    summary.grabbed += 1;
                    info!(title = %row.release.title, "pending release dispatched");
                    for history in self.history_rows(run_id, &row, HistoryStatus::Grabbed) {
                        support::record(
                            deps,
                            history
                                .with_grab(row.release.title.clone(), queue_item.id)
                                .with_upgrade(row.is_upgrade)
                                .with_scores(None, Some(row.score)),
                        )
                        .await;
                    }
                }
                Err(err) if matches!(err, cinephage_core::CinephageError::Cancelled { .. }) => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(title = %row.release.title, error = %err, "pending dispatch failed");
                    summary.errored += 1;
                    deps.grab
                        .blocklist_failure(
                            &row.release,
                            row.content.clone(),
                            BlockReason::DownloadFailed,
                            err.to_string(),
                            Duration::hours(24),
                        )
                        .await?;
                    row.mark_expired();
                    deps.pending.update(&row).await?;
                    for history in self.history_rows(run_id, &row, HistoryStatus::Error) {
                        support::record(deps, history.with_error(err.to_string())).await;
                    }
                }
            }
        }

        Ok(summary)
    }
}
