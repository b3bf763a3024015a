//! New-episode task
//!
//! Watches for episodes whose air date fell inside the last interval and
//! searches for them immediately. The window equals the task interval, so
//! each airing is observed by exactly one tick.

use super::support;
use super::{MonitoringTask, TaskDeps, TaskSummary};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use cinephage_core::{Result, TaskType};
use cinephage_decision::{
    BlocklistSpec, DecisionPipeline, EpisodeMonitoredSpec, MinimumScoreSpec, MissingContentSpec,
    NewEpisodeSpec, ProtocolAllowedSpec, SearchCooldownSpec, SizeSpec,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub struct NewEpisodeTask {
    deps: Arc<TaskDeps>,
    candidate_specs: DecisionPipeline,
}

impl NewEpisodeTask {
    pub fn new(deps: Arc<TaskDeps>) -> Self {
        let candidate_specs = DecisionPipeline::new(vec![
            Arc::new(ProtocolAllowedSpec),
            Arc::new(MinimumScoreSpec),
            Arc::new(SizeSpec),
            Arc::new(BlocklistSpec::new(deps.blocklist.clone())),
        ]);
        Self {
            deps,
            candidate_specs,
        }
    }
}

#[async_trait]
impl MonitoringTask for NewEpisodeTask {
    fn kind(&self) -> TaskType {
        TaskType::NewEpisode
    }

    async fn run(&self, run_id: Uuid, token: &CancellationToken) -> Result<TaskSummary> {
        let deps = &self.deps;
        let settings = deps.settings.monitoring().await?;
        let window_hours = settings.new_episode_interval_hours;
        let mut summary = TaskSummary::default();

        // the pre-pipeline carries the window, so it is rebuilt per run
        let pre_specs = DecisionPipeline::new(vec![
            Arc::new(EpisodeMonitoredSpec),
            Arc::new(NewEpisodeSpec { window_hours }),
            Arc::new(MissingContentSpec),
            Arc::new(SearchCooldownSpec::new(deps.cooldowns.clone())),
        ]);

        let now = Utc::now();
        let aired = deps
            .series
            .find_monitored_aired_between(now - Duration::hours(window_hours), now)
            .await?;
        debug!(count = aired.len(), "episodes aired inside the window");

        for episode in aired.into_iter().take(settings.batch_cap) {
            if token.is_cancelled() {
                return Ok(summary);
            }
            if episode.has_file {
                continue;
            }
            let Some(item) = support::episode_item(deps, episode).await? else {
                continue;
            };
            let result = support::search_and_grab(
                deps,
                run_id,
                TaskType::NewEpisode,
                item,
                &pre_specs,
                &self.candidate_specs,
                false,
                &settings,
                token,
            )
            .await?;
            summary.absorb(&result);
        }

        Ok(summary)
    }
}
