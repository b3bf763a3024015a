//! Upgrade task
//!
//! Searches items that already have a file for a better release. One task
//! covers both the periodic upgrade sweep and the cutoff-unmet sweep; the
//! `cutoff_unmet_only` flag restricts the run to items whose profile has a
//! cutoff the existing file has not reached.

use super::support;
use super::{MonitoringTask, TaskDeps, TaskSummary};
use async_trait::async_trait;
use cinephage_core::{HistoryStatus, Result, TaskType};
use cinephage_decision::{
    BlocklistSpec, CutoffUnmetSpec, DecisionPipeline, EpisodeMonitoredSpec, ItemContext,
    MovieMonitoredSpec, ProtocolAllowedSpec, Scorer, SearchCooldownSpec, SizeSpec,
    UpgradeableSpec,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct UpgradeTask {
    deps: Arc<TaskDeps>,
    cutoff_unmet_only: bool,
    pre_specs: DecisionPipeline,
}

impl UpgradeTask {
    pub fn new(deps: Arc<TaskDeps>, cutoff_unmet_only: bool) -> Self {
        let pre_specs = DecisionPipeline::new(vec![
            Arc::new(MovieMonitoredSpec),
            Arc::new(EpisodeMonitoredSpec),
            Arc::new(CutoffUnmetSpec),
            Arc::new(SearchCooldownSpec::new(deps.cooldowns.clone())),
        ]);
        Self {
            deps,
            cutoff_unmet_only,
            pre_specs,
        }
    }

    /// The candidate pipeline is rebuilt per run so a hot-swapped format
    /// registry is observed within one tick.
    fn candidate_specs(&self) -> DecisionPipeline {
        let scorer = Scorer::new(self.deps.formats.get());
        DecisionPipeline::new(vec![
            Arc::new(ProtocolAllowedSpec),
            Arc::new(SizeSpec),
            Arc::new(BlocklistSpec::new(self.deps.blocklist.clone())),
            Arc::new(UpgradeableSpec::new(scorer)),
        ])
    }

    async fn upgrade_items(&self) -> Result<Vec<ItemContext>> {
        let deps = &self.deps;
        let mut items = Vec::new();

        for movie in deps.movies.find_monitored_with_file().await? {
            items.push(ItemContext::Movie { movie });
        }
        for episode in deps.series.find_monitored_episodes_with_file().await? {
            if let Some(item) = support::episode_item(deps, episode).await? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl MonitoringTask for UpgradeTask {
    fn kind(&self) -> TaskType {
        if self.cutoff_unmet_only {
            TaskType::CutoffUnmet
        } else {
            TaskType::Upgrade
        }
    }

    async fn run(&self, run_id: Uuid, token: &CancellationToken) -> Result<TaskSummary> {
        let deps = &self.deps;
        let task = self.kind();
        let settings = deps.settings.monitoring().await?;
        let candidate_specs = self.candidate_specs();
        let mut summary = TaskSummary::default();

        let items = self.upgrade_items().await?;
        for item in items.into_iter().take(settings.batch_cap) {
            if token.is_cancelled() {
                return Ok(summary);
            }

            if self.cutoff_unmet_only {
                // restricted to items whose profile carries a cutoff the
                // existing file is still below
                let Some(profile) = deps.profiles.get(item.profile_id()) else {
                    support::record(
                        deps,
                        support::history_row(run_id, task, &item, HistoryStatus::Error)
                            .with_error(format!("profile '{}' not found", item.profile_id())),
                    )
                    .await;
                    summary.considered += 1;
                    summary.errored += 1;
                    continue;
                };
                if !profile.has_cutoff() {
                    continue;
                }
                if let Some(existing) = item.existing_score() {
                    if existing >= profile.upgrade_until_score {
                        continue;
                    }
                }
            }

            let result = support::search_and_grab(
                deps,
                run_id,
                task,
                item,
                &self.pre_specs,
                &candidate_specs,
                true,
                &settings,
                token,
            )
            .await?;
            summary.absorb(&result);
        }

        Ok(summary)
    }
}
