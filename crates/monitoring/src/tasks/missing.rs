//! Missing-content task
//!
//! Walks monitored movies and episodes without a file and grabs the best
//! acceptable release for each. Whole-season gaps are searched as season
//! packs when the pack covers enough still-wanted episodes.

use super::support::{self, ItemResult};
use super::{MonitoringTask, TaskDeps, TaskSummary};
use crate::grab::GrabOutcome;
use async_trait::async_trait;
use cinephage_core::{ContentRef, Episode, HistoryStatus, Result, TaskType};
use cinephage_decision::{
    BlocklistSpec, DecisionPipeline, EpisodeMonitoredSpec, ItemContext, MinimumScoreSpec,
    MissingContentSpec, MovieMonitoredSpec, ProtocolAllowedSpec, Scorer, ScoringContext,
    SearchCooldownSpec, SizeSpec,
};
use cinephage_indexers::SearchCriteria;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

pub struct MissingContentTask {
    deps: Arc<TaskDeps>,
    pre_specs: DecisionPipeline,
    candidate_specs: DecisionPipeline,
}

impl MissingContentTask {
    pub fn new(deps: Arc<TaskDeps>) -> Self {
        let pre_specs = DecisionPipeline::new(vec![
            Arc::new(MovieMonitoredSpec),
            Arc::new(EpisodeMonitoredSpec),
            Arc::new(MissingContentSpec),
            Arc::new(SearchCooldownSpec::new(deps.cooldowns.clone())),
        ]);
        let candidate_specs = DecisionPipeline::new(vec![
            Arc::new(ProtocolAllowedSpec),
            Arc::new(MinimumScoreSpec),
            Arc::new(SizeSpec),
            Arc::new(BlocklistSpec::new(deps.blocklist.clone())),
        ]);
        Self {
            deps,
            pre_specs,
            candidate_specs,
        }
    }

    /// Search a full-season gap as one pack, linking every covered episode
    async fn search_season_pack(
        &self,
        run_id: Uuid,
        group: &[Episode],
        season_total: u32,
        token: &CancellationToken,
    ) -> Result<Vec<ItemResult>> {
        let deps = &self.deps;
        let representative = group[0].clone();
        let Some(item) = support::episode_item(deps, representative).await? else {
            return Ok(vec![ItemResult::Skipped; group.len()]);
        };
        let ItemContext::Episode { series, season, .. } = &item else {
            return Ok(vec![ItemResult::Skipped; group.len()]);
        };

        let Some(profile) = deps.profiles.get(item.profile_id()) else {
            return Ok(vec![ItemResult::Errored; group.len()]);
        };
        let settings = deps.settings.monitoring().await?;

        // honor the cooldown the previous run stamped on these episodes
        let representative_ref = ContentRef::episodes(
            group[0].series_id,
            vec![group[0].id],
            Some(group[0].season_number),
        );
        if let Some(cooldown) = deps
            .cooldowns
            .get(&representative_ref, TaskType::MissingContent)
            .await?
        {
            if cooldown.is_active(chrono::Utc::now()) {
                return Ok(vec![ItemResult::Skipped; group.len()]);
            }
        }

        let criteria = SearchCriteria::season_pack(series.tmdb_id, season.number)
            .with_title(series.title.clone());
        let outcome = deps.orchestrator.search(&criteria, &profile, token).await?;

        let content = ContentRef::episodes(
            series.id,
            group.iter().map(|e| e.id).collect(),
            Some(season.number),
        );
        for episode in group {
            let cooldown = cinephage_core::SearchCooldown::record(
                ContentRef::episodes(episode.series_id, vec![episode.id], Some(episode.season_number)),
                TaskType::MissingContent,
                settings.cooldown_for(TaskType::MissingContent),
            );
            let _ = deps.cooldowns.set(&cooldown).await;
        }

        let releases_found = outcome.releases.len() as u32;
        let Some(chosen) = outcome.chosen else {
            for episode in group {
                support::record(
                    deps,
                    cinephage_core::MonitoringHistory::new(
                        run_id,
                        TaskType::MissingContent,
                        HistoryStatus::NoResults,
                    )
                    .for_episode(episode.id)
                    .with_releases_found(releases_found),
                )
                .await;
            }
            return Ok(vec![ItemResult::NoResults; group.len()]);
        };

        // re-score with the real episode count so the per-episode size
        // window applies
        let scorer = Scorer::new(deps.formats.get());
        let score = scorer.score(
            &chosen.release.title,
            &profile,
            Some(chosen.release.size_bytes),
            &ScoringContext::season_pack(Some(season_total)),
        );

        let grab_outcome = deps
            .grab
            .grab_for_content(
                &chosen.release,
                &score,
                &item,
                content,
                &profile,
                false,
                token,
            )
            .await?;

        let (status, result, message) = match &grab_outcome {
            GrabOutcome::Queued(queue_item) => {
                info!(title = %chosen.release.title, "season pack grabbed");
                (
                    HistoryStatus::Grabbed,
                    ItemResult::Grabbed,
                    Some(queue_item.id.to_string()),
                )
            }
            GrabOutcome::Delayed(pending) => (
                HistoryStatus::Found,
                ItemResult::Found,
                Some(format!("delayed until {}", pending.process_at)),
            ),
            GrabOutcome::Rejected(decision) => (
                HistoryStatus::Found,
                ItemResult::Found,
                decision.reason.map(|r| r.to_string()),
            ),
        };

        for episode in group {
            let mut row =
                cinephage_core::MonitoringHistory::new(run_id, TaskType::MissingContent, status)
                    .for_episode(episode.id)
                    .with_releases_found(releases_found)
                    .with_scores(None, Some(score.total_score));
            if status == HistoryStatus::Grabbed {
                if let GrabOutcome::Queued(queue_item) = &grab_outcome {
                    row = row.with_grab(chosen.release.title.clone(), queue_item.id);
                }
            } else if let Some(message) = &message {
                row = row.with_error(message.clone());
            }
            support::record(deps, row).await;
        }

        Ok(vec![result; group.len()])
    }
}

#[async_trait]
impl MonitoringTask for MissingContentTask {
    fn kind(&self) -> TaskType {
        TaskType::MissingContent
    }

    async fn run(&self, run_id: Uuid, token: &CancellationToken) -> Result<TaskSummary> {
        let deps = &self.deps;
        let settings = deps.settings.monitoring().await?;
        let mut summary = TaskSummary::default();
        let mut budget = settings.batch_cap;

        // movies first
        let movies = deps.movies.find_monitored_missing().await?;
        for movie in movies.into_iter().take(budget) {
            if token.is_cancelled() {
                return Ok(summary);
            }
            let item = ItemContext::Movie { movie };
            let result = support::search_and_grab(
                deps,
                run_id,
                TaskType::MissingContent,
                item,
                &self.pre_specs,
                &self.candidate_specs,
                false,
                &settings,
                token,
            )
            .await?;
            summary.absorb(&result);
            budget = budget.saturating_sub(1);
        }

        if budget == 0 {
            debug!("missing-content batch cap reached before episodes");
            return Ok(summary);
        }

        // group missing episodes by season for pack planning
        let episodes = deps.series.find_monitored_missing_episodes().await?;
        let mut by_season: HashMap<(Uuid, i32), Vec<Episode>> = HashMap::new();
        for episode in episodes {
            by_season
                .entry((episode.series_id, episode.season_number))
                .or_default()
                .push(episode);
        }

        for ((series_id, season_number), group) in by_season {
            if token.is_cancelled() || budget == 0 {
                break;
            }

            let season_total = deps
                .series
                .episodes_for_series(series_id)
                .await?
                .iter()
                .filter(|e| e.season_number == season_number)
                .count() as u32;

            let pack_eligible = {
                let profile_id = deps
                    .series
                    .get_series(series_id)
                    .await?
                    .map(|s| s.profile_id);
                let prefs = profile_id
                    .and_then(|id| deps.profiles.get(&id))
                    .map(|p| p.pack_preference);
                match prefs {
                    Some(prefs) => {
                        prefs.enabled
                            && group.len() >= 2
                            && season_total > 0
                            && group.len() as u32 * 100
                                >= season_total * prefs.min_wanted_episodes_percent as u32
                    }
                    None => false,
                }
            };

            if pack_eligible {
                let take = group.len().min(budget);
                let group = &group[..take];
                let results = self
                    .search_season_pack(run_id, group, season_total, token)
                    .await?;
                for result in &results {
                    summary.absorb(result);
                }
                budget = budget.saturating_sub(results.len());
                continue;
            }

            for episode in group {
                if token.is_cancelled() || budget == 0 {
                    break;
                }
                let Some(item) = support::episode_item(deps, episode).await? else {
                    continue;
                };
                let result = support::search_and_grab(
                    deps,
                    run_id,
                    TaskType::MissingContent,
                    item,
                    &self.pre_specs,
                    &self.candidate_specs,
                    false,
                    &settings,
                    token,
                )
                .await?;
                summary.absorb(&result);
                budget = budget.saturating_sub(1);
            }
        }

        Ok(summary)
    }
}
