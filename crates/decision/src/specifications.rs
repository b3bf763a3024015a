//! Acceptance specifications and the decision pipeline
//!
//! Each specification is a predicate over an evaluation context, returning
//! an accept/reject decision with a stable rejection reason. Tasks run the
//! specs in a fixed order; the first rejection short-circuits and is
//! recorded in monitoring history.

use crate::profiles::ScoringProfile;
use crate::scoring::{MediaType, Scorer, ScoringContext, ScoringResult, UpgradeOptions};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cinephage_core::{
    BlocklistRepository, ContentRef, DelayProfileRepository, Episode, Movie, Release, Result,
    SearchCooldownRepository, Season, Series, TaskType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable, enumerated rejection reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    NoProfile,
    UpgradesNotAllowed,
    QualityNotBetter,
    ImprovementTooSmall,
    AlreadyAtCutoff,
    NotMonitored,
    Blocklisted,
    CooldownActive,
    BelowMinScore,
    SizeRejected,
    ProtocolNotAllowed,
    NoExistingFile,
    NoReleaseCandidate,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectionReason::NoProfile => "NO_PROFILE",
            RejectionReason::UpgradesNotAllowed => "UPGRADES_NOT_ALLOWED",
            RejectionReason::QualityNotBetter => "QUALITY_NOT_BETTER",
            RejectionReason::ImprovementTooSmall => "IMPROVEMENT_TOO_SMALL",
            RejectionReason::AlreadyAtCutoff => "ALREADY_AT_CUTOFF",
            RejectionReason::NotMonitored => "NOT_MONITORED",
            RejectionReason::Blocklisted => "BLOCKLISTED",
            RejectionReason::CooldownActive => "COOLDOWN_ACTIVE",
            RejectionReason::BelowMinScore => "BELOW_MIN_SCORE",
            RejectionReason::SizeRejected => "SIZE_REJECTED",
            RejectionReason::ProtocolNotAllowed => "PROTOCOL_NOT_ALLOWED",
            RejectionReason::NoExistingFile => "NO_EXISTING_FILE",
            RejectionReason::NoReleaseCandidate => "NO_RELEASE_CANDIDATE",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one specification
#[derive(Debug, Clone)]
pub struct Decision {
    pub accepted: bool,
    pub reason: Option<RejectionReason>,
    pub message: Option<String>,
}

impl Decision {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
            message: None,
        }
    }

    pub fn reject(reason: RejectionReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            message: None,
        }
    }

    pub fn reject_with(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            message: Some(message.into()),
        }
    }
}

/// The library item under consideration
#[derive(Debug, Clone)]
pub enum ItemContext {
    Movie {
        movie: Movie,
    },
    Episode {
        episode: Episode,
        series: Series,
        season: Season,
    },
}

impl ItemContext {
    pub fn is_monitored(&self) -> bool {
        match self {
            ItemContext::Movie { movie } => movie.monitored,
            ItemContext::Episode {
                episode,
                series,
                season,
            } => episode.is_effectively_monitored(series, season),
        }
    }

    pub fn has_file(&self) -> bool {
        match self {
            ItemContext::Movie { movie } => movie.has_file,
            ItemContext::Episode { episode, .. } => episode.has_file,
        }
    }

    pub fn existing_score(&self) -> Option<i32> {
        match self {
            ItemContext::Movie { movie } => movie.existing_score(),
            ItemContext::Episode { episode, .. } => episode.existing_score(),
        }
    }

    pub fn existing_scene_name(&self) -> Option<&str> {
        match self {
            ItemContext::Movie { movie } => {
                movie.existing_file.as_ref().map(|f| f.scene_name.as_str())
            }
            ItemContext::Episode { episode, .. } => {
                episode.existing_file.as_ref().map(|f| f.scene_name.as_str())
            }
        }
    }

    pub fn content_ref(&self) -> ContentRef {
        match self {
            ItemContext::Movie { movie } => ContentRef::movie(movie.id),
            ItemContext::Episode { episode, .. } => ContentRef::episodes(
                episode.series_id,
                vec![episode.id],
                Some(episode.season_number),
            ),
        }
    }

    pub fn air_date(&self) -> Option<DateTime<Utc>> {
        match self {
            ItemContext::Movie { .. } => None,
            ItemContext::Episode { episode, .. } => episode.air_date,
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            ItemContext::Movie { .. } => MediaType::Movie,
            ItemContext::Episode { .. } => MediaType::Tv,
        }
    }

    pub fn profile_id(&self) -> &str {
        match self {
            ItemContext::Movie { movie } => &movie.profile_id,
            ItemContext::Episode { series, .. } => &series.profile_id,
        }
    }
}

/// A candidate release with its precomputed score
#[derive(Debug, Clone)]
pub struct CandidateContext {
    pub release: Release,
    pub score: ScoringResult,
}

/// Everything a specification may look at
#[derive(Clone)]
pub struct EvaluationContext {
    pub now: DateTime<Utc>,
    pub task: Option<TaskType>,
    pub profile: Option<ScoringProfile>,
    pub item: ItemContext,
    pub candidate: Option<CandidateContext>,
}

impl EvaluationContext {
    pub fn new(item: ItemContext) -> Self {
        Self {
            now: Utc::now(),
            task: None,
            profile: None,
            item,
            candidate: None,
        }
    }

    pub fn with_task(mut self, task: TaskType) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_profile(mut self, profile: ScoringProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_candidate(mut self, release: Release, score: ScoringResult) -> Self {
        self.candidate = Some(CandidateContext { release, score });
        self
    }
}

/// A predicate over the evaluation context
#[async_trait]
pub trait Specification: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision;
}

/// Enforces the cascading monitoring invariant for movies
pub struct MovieMonitoredSpec;

#[async_trait]
impl Specification for MovieMonitoredSpec {
    fn name(&self) -> &'static str {
        "movie_monitored"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        match &ctx.item {
            ItemContext::Movie { movie } if !movie.monitored => {
                Decision::reject(RejectionReason::NotMonitored)
            }
            _ => Decision::accept(),
        }
    }
}

/// Enforces series AND season AND episode monitored
pub struct EpisodeMonitoredSpec;

#[async_trait]
impl Specification for EpisodeMonitoredSpec {
    fn name(&self) -> &'static str {
        "episode_monitored"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        match &ctx.item {
            ItemContext::Episode { .. } if !ctx.item.is_monitored() => {
                Decision::reject(RejectionReason::NotMonitored)
            }
            _ => Decision::accept(),
        }
    }
}

/// Accepts items that have no file yet
pub struct MissingContentSpec;

#[async_trait]
impl Specification for MissingContentSpec {
    fn name(&self) -> &'static str {
        "missing_content"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        if ctx.item.has_file() {
            Decision::reject_with(
                RejectionReason::NoReleaseCandidate,
                "content already has a file",
            )
        } else {
            Decision::accept()
        }
    }
}

/// Accepts episodes that aired within the window
pub struct NewEpisodeSpec {
    pub window_hours: i64,
}

#[async_trait]
impl Specification for NewEpisodeSpec {
    fn name(&self) -> &'static str {
        "new_episode"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(aired) = ctx.item.air_date() else {
            return Decision::reject_with(
                RejectionReason::NoReleaseCandidate,
                "episode has no air date",
            );
        };
        let from = ctx.now - Duration::hours(self.window_hours);
        if aired >= from && aired <= ctx.now {
            Decision::accept()
        } else {
            Decision::reject_with(
                RejectionReason::NoReleaseCandidate,
                "air date outside the window",
            )
        }
    }
}

/// Stops initiating upgrade searches once the existing score meets the
/// cutoff. Never rejects a better release already found; that is the
/// upgradeable spec's call.
pub struct CutoffUnmetSpec;

#[async_trait]
impl Specification for CutoffUnmetSpec {
    fn name(&self) -> &'static str {
        "cutoff_unmet"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(profile) = &ctx.profile else {
            return Decision::reject(RejectionReason::NoProfile);
        };
        if !profile.upgrades_allowed {
            return Decision::reject(RejectionReason::UpgradesNotAllowed);
        }
        if profile.has_cutoff() {
            if let Some(existing) = ctx.item.existing_score() {
                if existing >= profile.upgrade_until_score {
                    return Decision::reject(RejectionReason::AlreadyAtCutoff);
                }
            }
        }
        Decision::accept()
    }
}

/// Requires an existing file and a candidate that scores meaningfully
/// better. A candidate whose own score exceeds the cutoff is still
/// accepted; the cutoff only gates search initiation.
pub struct UpgradeableSpec {
    scorer: Scorer,
}

impl UpgradeableSpec {
    pub fn new(scorer: Scorer) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Specification for UpgradeableSpec {
    fn name(&self) -> &'static str {
        "upgradeable"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(profile) = &ctx.profile else {
            return Decision::reject(RejectionReason::NoProfile);
        };
        if !profile.upgrades_allowed {
            return Decision::reject(RejectionReason::UpgradesNotAllowed);
        }
        let Some(existing_title) = ctx.item.existing_scene_name() else {
            return Decision::reject(RejectionReason::NoExistingFile);
        };
        let Some(candidate) = &ctx.candidate else {
            return Decision::reject(RejectionReason::NoReleaseCandidate);
        };

        let scoring_ctx = ScoringContext {
            media_type: ctx.item.media_type(),
            is_season_pack: candidate.score.attributes.tv.is_season_pack,
            episode_count: None,
        };
        let opts = UpgradeOptions {
            min_improvement: profile.min_score_increment,
            candidate_size: Some(candidate.release.size_bytes),
            existing_size: None,
        };
        let decision = self.scorer.check_upgrade(
            existing_title,
            &candidate.release.title,
            profile,
            &scoring_ctx,
            &opts,
        );

        if decision.is_upgrade {
            return Decision::accept();
        }
        if decision.improvement <= 0 || decision.candidate.is_banned {
            Decision::reject_with(
                RejectionReason::QualityNotBetter,
                format!("improvement {}", decision.improvement),
            )
        } else {
            Decision::reject_with(
                RejectionReason::ImprovementTooSmall,
                format!(
                    "improvement {} below increment {}",
                    decision.improvement,
                    opts.min_improvement.max(1)
                ),
            )
        }
    }
}

/// Rejects releases matched by a live blocklist entry
pub struct BlocklistSpec {
    repo: Arc<dyn BlocklistRepository>,
}

impl BlocklistSpec {
    pub fn new(repo: Arc<dyn BlocklistRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Specification for BlocklistSpec {
    fn name(&self) -> &'static str {
        "blocklist"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(candidate) = &ctx.candidate else {
            return Decision::accept();
        };
        let content = ctx.item.content_ref();
        match self.repo.is_blocked(&candidate.release, &content).await {
            Ok(true) => Decision::reject(RejectionReason::Blocklisted),
            Ok(false) => Decision::accept(),
            Err(err) => Decision::reject_with(RejectionReason::Blocklisted, err.to_string()),
        }
    }
}

/// Rejects items searched too recently
pub struct SearchCooldownSpec {
    repo: Arc<dyn SearchCooldownRepository>,
}

impl SearchCooldownSpec {
    pub fn new(repo: Arc<dyn SearchCooldownRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Specification for SearchCooldownSpec {
    fn name(&self) -> &'static str {
        "search_cooldown"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(task) = ctx.task else {
            return Decision::accept();
        };
        let content = ctx.item.content_ref();
        match self.repo.get(&content, task).await {
            Ok(Some(cooldown)) if cooldown.is_active(ctx.now) => Decision::reject_with(
                RejectionReason::CooldownActive,
                format!("next search at {}", cooldown.next_search_at),
            ),
            _ => Decision::accept(),
        }
    }
}

/// Rejects protocols the profile does not allow
pub struct ProtocolAllowedSpec;

#[async_trait]
impl Specification for ProtocolAllowedSpec {
    fn name(&self) -> &'static str {
        "protocol_allowed"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(candidate) = &ctx.candidate else {
            return Decision::accept();
        };
        let Some(profile) = &ctx.profile else {
            return Decision::reject(RejectionReason::NoProfile);
        };
        if profile.allows_protocol(candidate.release.protocol) {
            Decision::accept()
        } else {
            Decision::reject_with(
                RejectionReason::ProtocolNotAllowed,
                candidate.release.protocol.to_string(),
            )
        }
    }
}

/// Mirrors the scorer's size verdict as a standalone filter
pub struct SizeSpec;

#[async_trait]
impl Specification for SizeSpec {
    fn name(&self) -> &'static str {
        "size"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        match &ctx.candidate {
            Some(candidate) if candidate.score.size_rejected => {
                let message = candidate
                    .score
                    .size_rejection_reason
                    .clone()
                    .unwrap_or_else(|| "size outside the profile window".to_string());
                Decision::reject_with(RejectionReason::SizeRejected, message)
            }
            _ => Decision::accept(),
        }
    }
}

/// Rejects candidates below the profile's minimum score, and banned ones
pub struct MinimumScoreSpec;

#[async_trait]
impl Specification for MinimumScoreSpec {
    fn name(&self) -> &'static str {
        "minimum_score"
    }

    async fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        let Some(candidate) = &ctx.candidate else {
            return Decision::accept();
        };
        let Some(profile) = &ctx.profile else {
            return Decision::reject(RejectionReason::NoProfile);
        };
        if candidate.score.is_banned {
            return Decision::reject_with(
                RejectionReason::BelowMinScore,
                format!("banned: {}", candidate.score.banned_reasons.join(", ")),
            );
        }
        if candidate.score.total_score < profile.min_score {
            return Decision::reject_with(
                RejectionReason::BelowMinScore,
                format!(
                    "score {} below minimum {}",
                    candidate.score.total_score, profile.min_score
                ),
            );
        }
        Decision::accept()
    }
}

/// Verdict of the delay computation
#[derive(Debug, Clone)]
pub struct DelayVerdict {
    pub should_delay: bool,
    pub process_at: Option<DateTime<Utc>>,
}

/// Computes the grab time for a candidate. As a specification it always
/// accepts; the grab service consults `verdict` to route the release into
/// the pending queue.
pub struct DelaySpec {
    repo: Arc<dyn DelayProfileRepository>,
}

impl DelaySpec {
    pub fn new(repo: Arc<dyn DelayProfileRepository>) -> Self {
        Self { repo }
    }

    /// Delay computation with bypasses. Bypass conditions dispatch
    /// immediately: candidate already meets the profile cutoff, or its
    /// score clears the profile-independent threshold.
    pub async fn verdict(&self, ctx: &EvaluationContext) -> Result<DelayVerdict> {
        let Some(candidate) = &ctx.candidate else {
            return Ok(DelayVerdict {
                should_delay: false,
                process_at: None,
            });
        };

        let profiles = self.repo.list_enabled().await?;
        let Some(delay_profile) = profiles.into_iter().next() else {
            return Ok(DelayVerdict {
                should_delay: false,
                process_at: None,
            });
        };

        if delay_profile.bypass_if_highest_quality {
            if let Some(profile) = &ctx.profile {
                if profile.has_cutoff()
                    && candidate.score.total_score >= profile.upgrade_until_score
                {
                    return Ok(DelayVerdict {
                        should_delay: false,
                        process_at: None,
                    });
                }
            }
        }
        if let Some(threshold) = delay_profile.bypass_if_above_score {
            if candidate.score.total_score >= threshold {
                return Ok(DelayVerdict {
                    should_delay: false,
                    process_at: None,
                });
            }
        }

        let delay = delay_profile.delay_for(
            candidate.release.protocol,
            candidate.score.attributes.resolution.label(),
        );
        if delay.is_zero() {
            return Ok(DelayVerdict {
                should_delay: false,
                process_at: None,
            });
        }

        Ok(DelayVerdict {
            should_delay: true,
            process_at: Some(ctx.now + delay),
        })
    }
}

#[async_trait]
impl Specification for DelaySpec {
    fn name(&self) -> &'static str {
        "delay"
    }

    async fn evaluate(&self, _ctx: &EvaluationContext) -> Decision {
        Decision::accept()
    }
}

/// Outcome of running a pipeline
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub accepted: bool,
    pub rejected_by: Option<String>,
    pub decision: Decision,
}

/// Runs specifications in a fixed order; the first rejection
/// short-circuits.
pub struct DecisionPipeline {
    specs: Vec<Arc<dyn Specification>>,
}

impl DecisionPipeline {
    pub fn new(specs: Vec<Arc<dyn Specification>>) -> Self {
        Self { specs }
    }

    pub async fn evaluate(&self, ctx: &EvaluationContext) -> PipelineOutcome {
        for spec in &self.specs {
            let decision = spec.evaluate(ctx).await;
            if !decision.accepted {
                return PipelineOutcome {
                    accepted: false,
                    rejected_by: Some(spec.name().to_string()),
                    decision,
                };
            }
        }
        PipelineOutcome {
            accepted: true,
            rejected_by: None,
            decision: Decision::accept(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::default_formats;
    use crate::formats::FormatRegistry;
    use crate::profiles::best;
    use cinephage_core::{MediaFile, MemoryStore, Protocol};
    use uuid::Uuid;

    fn scorer() -> Scorer {
        Scorer::new(Arc::new(FormatRegistry::build(default_formats()).unwrap()))
    }

    fn movie_ctx(monitored: bool, has_file: bool) -> EvaluationContext {
        let mut movie = Movie::new(550, "Movie", "best");
        movie.monitored = monitored;
        if has_file {
            movie.set_file(MediaFile::new(
                "Movie.2024.1080p.WEB-DL-GROUP",
                4_000_000_000,
                Some(4000),
            ));
        }
        EvaluationContext::new(ItemContext::Movie { movie }).with_profile(best())
    }

    fn candidate(title: &str) -> (Release, ScoringResult) {
        let release = Release::new(title, 1, "alpha", Protocol::Torrent, 4_000_000_000);
        let score = scorer().score(title, &best(), Some(4_000_000_000), &ScoringContext::movie());
        (release, score)
    }

    #[tokio::test]
    async fn unmonitored_movie_rejected() {
        let ctx = movie_ctx(false, false);
        let decision = MovieMonitoredSpec.evaluate(&ctx).await;
        assert!(!decision.accepted);
        assert_eq!(decision.reason, Some(RejectionReason::NotMonitored));
    }

    #[tokio::test]
    async fn episode_cascade_enforced() {
        let mut series = Series::new(100, "Show", "best");
        series.monitored = false;
        let season = Season::new(series.id, 1);
        let episode = Episode::new(series.id, 1, 1);
        let ctx = EvaluationContext::new(ItemContext::Episode {
            episode,
            series,
            season,
        });

        let decision = EpisodeMonitoredSpec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::NotMonitored));
    }

    #[tokio::test]
    async fn cutoff_rejects_once_met() {
        let mut ctx = movie_ctx(true, true);
        let mut profile = best();
        profile.upgrade_until_score = 3000;
        ctx.profile = Some(profile);

        // existing score is 4000 >= cutoff 3000
        let decision = CutoffUnmetSpec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::AlreadyAtCutoff));

        // without a cutoff the spec accepts
        let ctx = movie_ctx(true, true);
        let decision = CutoffUnmetSpec.evaluate(&ctx).await;
        assert!(decision.accepted);
    }

    #[tokio::test]
    async fn upgradeable_accepts_candidate_above_cutoff() {
        // the cutoff never rejects a better release already found
        let mut ctx = movie_ctx(true, true);
        let mut profile = best();
        profile.upgrade_until_score = 100;
        ctx.profile = Some(profile);

        let (release, score) =
            candidate("Movie.2024.2160p.UHD.BluRay.REMUX.TrueHD.Atmos-GROUP");
        ctx.candidate = Some(CandidateContext { release, score });

        let spec = UpgradeableSpec::new(scorer());
        let decision = spec.evaluate(&ctx).await;
        assert!(decision.accepted);
    }

    #[tokio::test]
    async fn upgradeable_rejects_worse_candidate() {
        let mut movie = Movie::new(550, "Movie", "best");
        movie.set_file(MediaFile::new(
            "Movie.2024.2160p.UHD.BluRay.REMUX.TrueHD.Atmos-GROUP",
            60_000_000_000,
            Some(18000),
        ));
        let mut ctx =
            EvaluationContext::new(ItemContext::Movie { movie }).with_profile(best());
        let (release, score) = candidate("Movie.2024.1080p.WEB-DL-GROUP");
        ctx.candidate = Some(CandidateContext { release, score });

        let spec = UpgradeableSpec::new(scorer());
        let decision = spec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::QualityNotBetter));
    }

    #[tokio::test]
    async fn upgradeable_requires_existing_file() {
        let mut ctx = movie_ctx(true, false);
        let (release, score) = candidate("Movie.2024.2160p.BluRay.REMUX-GROUP");
        ctx.candidate = Some(CandidateContext { release, score });

        let spec = UpgradeableSpec::new(scorer());
        let decision = spec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::NoExistingFile));
    }

    #[tokio::test]
    async fn protocol_spec_filters_disallowed() {
        let mut ctx = movie_ctx(true, false);
        let mut profile = best();
        profile.allowed_protocols = vec![Protocol::Usenet];
        ctx.profile = Some(profile);

        let (release, score) = candidate("Movie.2024.1080p.WEB-DL-GROUP");
        ctx.candidate = Some(CandidateContext { release, score });

        let decision = ProtocolAllowedSpec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::ProtocolNotAllowed));
    }

    #[tokio::test]
    async fn blocklist_spec_consults_repository() {
        let store = Arc::new(MemoryStore::new());
        let ctx = {
            let mut ctx = movie_ctx(true, false);
            let (release, score) = candidate("Movie.2024.1080p.WEB-DL-GROUP");
            ctx.candidate = Some(CandidateContext { release, score });
            ctx
        };

        let spec = BlocklistSpec::new(store.clone());
        assert!(spec.evaluate(&ctx).await.accepted);

        let content = ctx.item.content_ref();
        let entry = cinephage_core::BlocklistEntry::new(
            &ctx.candidate.as_ref().unwrap().release,
            content,
            cinephage_core::BlockReason::DownloadFailed,
        );
        BlocklistRepository::insert(store.as_ref(), &entry)
            .await
            .unwrap();

        let decision = spec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::Blocklisted));
    }

    #[tokio::test]
    async fn ban_dominance_through_the_pipeline() {
        // a banned release is rejected no matter how the pipeline is entered
        let mut ctx = movie_ctx(true, false).with_task(TaskType::MissingContent);
        let (release, score) = candidate("Movie.2024.1080p.CAM-GROUP");
        assert!(score.is_banned);
        ctx.candidate = Some(CandidateContext { release, score });

        let store = Arc::new(MemoryStore::new());
        let pipeline = DecisionPipeline::new(vec![
            Arc::new(MovieMonitoredSpec),
            Arc::new(MissingContentSpec),
            Arc::new(ProtocolAllowedSpec),
            Arc::new(MinimumScoreSpec),
            Arc::new(SizeSpec),
            Arc::new(BlocklistSpec::new(store)),
        ]);

        let outcome = pipeline.evaluate(&ctx).await;
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.decision.reason,
            Some(RejectionReason::BelowMinScore)
        );
    }

    #[tokio::test]
    async fn pipeline_short_circuits_in_order() {
        // unmonitored is checked before the blocklist, so the blocklist repo
        // is never consulted
        let ctx = movie_ctx(false, false);
        let store = Arc::new(MemoryStore::new());
        let pipeline = DecisionPipeline::new(vec![
            Arc::new(MovieMonitoredSpec),
            Arc::new(BlocklistSpec::new(store)),
        ]);

        let outcome = pipeline.evaluate(&ctx).await;
        assert_eq!(outcome.rejected_by.as_deref(), Some("movie_monitored"));
    }

    #[tokio::test]
    async fn delay_verdict_and_bypasses() {
        let store = Arc::new(MemoryStore::new());
        let delay_profile = cinephage_core::DelayProfile::new().with_torrent_delay(60);
        DelayProfileRepository::upsert(store.as_ref(), &delay_profile)
            .await
            .unwrap();

        let spec = DelaySpec::new(store.clone());

        let mut ctx = movie_ctx(true, false);
        let (release, score) = candidate("Movie.2024.1080p.WEB-DL-GROUP");
        ctx.candidate = Some(CandidateContext { release, score });

        let verdict = spec.verdict(&ctx).await.unwrap();
        assert!(verdict.should_delay);
        let process_at = verdict.process_at.unwrap();
        assert!(process_at > ctx.now + Duration::minutes(59));
        assert!(process_at <= ctx.now + Duration::minutes(61));

        // bypass when the score clears the configured threshold
        let mut bypass_profile = cinephage_core::DelayProfile::new().with_torrent_delay(60);
        bypass_profile.bypass_if_above_score = Some(100);
        let bypass_store = Arc::new(MemoryStore::new());
        DelayProfileRepository::upsert(bypass_store.as_ref(), &bypass_profile)
            .await
            .unwrap();
        let bypass_spec = DelaySpec::new(bypass_store);
        let verdict = bypass_spec.verdict(&ctx).await.unwrap();
        assert!(!verdict.should_delay);
    }

    #[tokio::test]
    async fn cooldown_spec_rejects_recent_search() {
        let store = Arc::new(MemoryStore::new());
        let ctx = movie_ctx(true, false).with_task(TaskType::MissingContent);

        let spec = SearchCooldownSpec::new(store.clone());
        assert!(spec.evaluate(&ctx).await.accepted);

        let cooldown = cinephage_core::SearchCooldown::record(
            ctx.item.content_ref(),
            TaskType::MissingContent,
            Duration::hours(18),
        );
        SearchCooldownRepository::set(store.as_ref(), &cooldown)
            .await
            .unwrap();

        let decision = spec.evaluate(&ctx).await;
        assert_eq!(decision.reason, Some(RejectionReason::CooldownActive));
    }
}
