//! Shared plumbing for the monitoring tasks

use super::TaskDeps;
use crate::grab::GrabOutcome;
use cinephage_core::{
    Episode, HistoryStatus, MonitoringHistory, MonitoringSettings, Result, SearchCooldown,
    TaskType,
};
use cinephage_decision::{
    DecisionPipeline, EvaluationContext, ItemContext, PipelineOutcome,
};
use cinephage_indexers::SearchCriteria;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

/// What happened to one item in a task run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemResult {
    Grabbed,
    Found,
    NoResults,
    Skipped,
    Errored,
}

/// Resolve an episode into its full item context; `None` when the series
/// or season row is missing (stale library data).
pub(crate) async fn episode_item(deps: &TaskDeps, episode: Episode) -> Result<Option<ItemContext>> {
    let Some(series) = deps.series.get_series(episode.series_id).await? else {
        return Ok(None);
    };
    let Some(season) = deps
        .series
        .get_season(episode.series_id, episode.season_number)
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(ItemContext::Episode {
        episode,
        series,
        season,
    }))
}

/// Search criteria for a single item
pub(crate) fn criteria_for(item: &ItemContext) -> SearchCriteria {
    match item {
        ItemContext::Movie { movie } => {
            let mut criteria = SearchCriteria::movie(movie.tmdb_id).with_title(movie.title.clone());
            if let Some(year) = movie.year {
                criteria = criteria.with_year(year);
            }
            criteria
        }
        ItemContext::Episode {
            episode, series, ..
        } => SearchCriteria::episode(series.tmdb_id, episode.season_number, episode.number)
            .with_title(series.title.clone()),
    }
}

/// Base history row for an item
pub(crate) fn history_row(
    run_id: Uuid,
    task: TaskType,
    item: &ItemContext,
    status: HistoryStatus,
) -> MonitoringHistory {
    let row = MonitoringHistory::new(run_id, task, status);
    match item {
        ItemContext::Movie { movie } => row.for_movie(movie.id),
        ItemContext::Episode { episode, .. } => row.for_episode(episode.id),
    }
}

/// Record a history row; failures are logged, never fatal to the run
pub(crate) async fn record(deps: &TaskDeps, row: MonitoringHistory) {
    if let Err(err) = deps.history.record_item(&row).await {
        error!(error = %err, "failed to record monitoring history");
    }
}

/// Set the post-search cooldown for an item
pub(crate) async fn set_cooldown(
    deps: &TaskDeps,
    item: &ItemContext,
    task: TaskType,
    settings: &MonitoringSettings,
) {
    let cooldown = SearchCooldown::record(item.content_ref(), task, settings.cooldown_for(task));
    if let Err(err) = deps.cooldowns.set(&cooldown).await {
        warn!(error = %err, "failed to persist search cooldown");
    }
}

/// The common per-item flow: pre-specs, search, cooldown, candidate specs,
/// grab. Writes the item's history row and returns what happened.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn search_and_grab(
    deps: &TaskDeps,
    run_id: Uuid,
    task: TaskType,
    item: ItemContext,
    pre_specs: &DecisionPipeline,
    candidate_specs: &DecisionPipeline,
    is_upgrade: bool,
    settings: &MonitoringSettings,
    token: &CancellationToken,
) -> Result<ItemResult> {
    let Some(profile) = deps.profiles.get(item.profile_id()) else {
        record(
            deps,
            history_row(run_id, task, &item, HistoryStatus::Error)
                .with_error(format!("profile '{}' not found", item.profile_id())),
        )
        .await;
        return Ok(ItemResult::Errored);
    };

    let ctx = EvaluationContext::new(item.clone())
        .with_task(task)
        .with_profile(profile.clone());

    let pre: PipelineOutcome = pre_specs.evaluate(&ctx).await;
    if !pre.accepted {
        record(
            deps,
            history_row(run_id, task, &item, HistoryStatus::NoResults).with_error(
                pre.decision
                    .reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "rejected".to_string()),
            ),
        )
        .await;
        return Ok(ItemResult::Skipped);
    }

    let criteria = criteria_for(&item);
    let outcome = deps.orchestrator.search(&criteria, &profile, token).await?;
    set_cooldown(deps, &item, task, settings).await;

    let releases_found = outcome.releases.len() as u32;
    let Some(chosen) = outcome.chosen else {
        record(
            deps,
            history_row(run_id, task, &item, HistoryStatus::NoResults)
                .with_releases_found(releases_found),
        )
        .await;
        return Ok(ItemResult::NoResults);
    };

    let candidate_ctx = ctx
        .clone()
        .with_candidate(chosen.release.clone(), chosen.score.clone());
    let verdict = candidate_specs.evaluate(&candidate_ctx).await;
    if !verdict.accepted {
        record(
            deps,
            history_row(run_id, task, &item, HistoryStatus::Found)
                .with_releases_found(releases_found)
                .with_scores(item.existing_score(), Some(chosen.score.total_score))
                .with_error(
                    verdict
                        .decision
                        .reason
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "rejected".to_string()),
                ),
        )
        .await;
        return Ok(ItemResult::Found);
    }

    let grab_outcome = deps
        .grab
        .grab(
            &chosen.release,
            &chosen.score,
            &item,
            &profile,
            is_upgrade,
            token,
        )
        .await?;

    let result = match grab_outcome {
        GrabOutcome::Queued(queue_item) => {
            record(
                deps,
                history_row(run_id, task, &item, HistoryStatus::Grabbed)
                    .with_releases_found(releases_found)
                    .with_grab(chosen.release.title.clone(), queue_item.id)
                    .with_scores(item.existing_score(), Some(chosen.score.total_score))
                    .with_upgrade(is_upgrade),
            )
            .await;
            ItemResult::Grabbed
        }
        GrabOutcome::Delayed(pending) => {
            record(
                deps,
                history_row(run_id, task, &item, HistoryStatus::Found)
                    .with_releases_found(releases_found)
                    .with_scores(item.existing_score(), Some(chosen.score.total_score))
                    .with_error(format!("delayed until {}", pending.process_at)),
            )
            .await;
            ItemResult::Found
        }
        GrabOutcome::Rejected(decision) => {
            record(
                deps,
                history_row(run_id, task, &item, HistoryStatus::Found)
                    .with_releases_found(releases_found)
                    .with_error(
                        decision
                            .reason
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "rejected".to_string()),
                    ),
            )
            .await;
            ItemResult::Found
        }
    };

    Ok(result)
}
