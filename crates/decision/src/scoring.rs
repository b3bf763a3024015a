//! Profile-driven release scoring
//!
//! Scores are the sum of matched custom-format scores under a profile, plus
//! the season-pack bonus for TV. Banned formats dominate: a release that
//! matches any `Banned`-category format is filtered out by downstream grab
//! logic regardless of its numeric score.

use crate::formats::{FormatCategory, FormatRegistry};
use crate::parser::{parse, ReleaseAttributes};
use crate::profiles::ScoringProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Sorting constant for banned releases
pub const BANNED_SCORE: i32 = -999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

/// Extra context for scoring: what kind of item the release is for and, for
/// season packs, how many episodes it covers.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub media_type: MediaType,
    pub is_season_pack: bool,
    pub episode_count: Option<u32>,
}

impl ScoringContext {
    pub fn movie() -> Self {
        Self::default()
    }

    pub fn episode() -> Self {
        Self {
            media_type: MediaType::Tv,
            ..Default::default()
        }
    }

    pub fn season_pack(episode_count: Option<u32>) -> Self {
        Self {
            media_type: MediaType::Tv,
            is_season_pack: true,
            episode_count,
        }
    }
}

/// One matched format with its effective score under the profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatMatch {
    pub id: String,
    pub name: String,
    pub category: FormatCategory,
    pub score: i32,
}

/// Full scoring verdict for one release under one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub total_score: i32,
    pub breakdown: HashMap<FormatCategory, i32>,
    pub matched_formats: Vec<FormatMatch>,
    pub meets_minimum: bool,
    pub is_banned: bool,
    pub banned_reasons: Vec<String>,
    pub size_rejected: bool,
    pub size_rejection_reason: Option<String>,
    pub attributes: ReleaseAttributes,
}

impl ScoringResult {
    /// Score used for ranking; banned releases sink to the bottom
    pub fn sort_score(&self) -> i32 {
        if self.is_banned {
            BANNED_SCORE
        } else {
            self.total_score
        }
    }
}

/// Options for the upgrade comparison
#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    pub min_improvement: i32,
    pub candidate_size: Option<i64>,
    pub existing_size: Option<i64>,
}

/// Verdict of comparing an existing file against a candidate release
#[derive(Debug, Clone)]
pub struct UpgradeDecision {
    pub is_upgrade: bool,
    pub existing: ScoringResult,
    pub candidate: ScoringResult,
    pub improvement: i32,
}

/// The scorer. Holds a compiled format registry snapshot; cheap to clone.
#[derive(Clone)]
pub struct Scorer {
    formats: Arc<FormatRegistry>,
}

impl Scorer {
    pub fn new(formats: Arc<FormatRegistry>) -> Self {
        Self { formats }
    }

    /// Score a release title under a profile
    pub fn score(
        &self,
        title: &str,
        profile: &ScoringProfile,
        size_bytes: Option<i64>,
        ctx: &ScoringContext,
    ) -> ScoringResult {
        let attrs = parse(title, size_bytes);

        let mut matched_formats = Vec::new();
        let mut breakdown: HashMap<FormatCategory, i32> = HashMap::new();
        let mut total = 0i32;
        let mut banned_reasons = Vec::new();

        for format in self.formats.evaluate(&attrs, title) {
            let score = profile.score_for(format.id());
            total += score;
            *breakdown.entry(format.category()).or_insert(0) += score;
            if format.category() == FormatCategory::Banned {
                banned_reasons.push(format.name().to_string());
            }
            matched_formats.push(FormatMatch {
                id: format.id().to_string(),
                name: format.name().to_string(),
                category: format.category(),
                score,
            });
        }

        if ctx.media_type == MediaType::Tv {
            let pack_bonus = self.pack_bonus(&attrs, profile, ctx);
            if pack_bonus != 0 {
                total += pack_bonus;
                *breakdown.entry(FormatCategory::Other).or_insert(0) += pack_bonus;
            }
        }

        let (size_rejected, size_rejection_reason) =
            self.size_verdict(profile, size_bytes, &attrs, ctx);

        let is_banned = !banned_reasons.is_empty();
        let meets_minimum = !is_banned && !size_rejected && total >= profile.min_score;

        ScoringResult {
            total_score: total,
            breakdown,
            matched_formats,
            meets_minimum,
            is_banned,
            banned_reasons,
            size_rejected,
            size_rejection_reason,
            attributes: attrs,
        }
    }

    /// Season-pack bonus: complete series > multi-season > single season >
    /// individual episode.
    fn pack_bonus(
        &self,
        attrs: &ReleaseAttributes,
        profile: &ScoringProfile,
        ctx: &ScoringContext,
    ) -> i32 {
        let prefs = &profile.pack_preference;
        if !prefs.enabled {
            return 0;
        }
        let is_pack = ctx.is_season_pack || attrs.tv.is_season_pack;
        if attrs.tv.is_complete_series {
            prefs.complete_series_bonus
        } else if is_pack && attrs.tv.season_count >= 2 {
            prefs.multi_season_bonus
        } else if is_pack {
            prefs.single_season_bonus
        } else {
            0
        }
    }

    /// Size windows are inclusive at both bounds. Season packs are judged
    /// on the per-episode average; with an unknown episode count the check
    /// is skipped.
    fn size_verdict(
        &self,
        profile: &ScoringProfile,
        size_bytes: Option<i64>,
        attrs: &ReleaseAttributes,
        ctx: &ScoringContext,
    ) -> (bool, Option<String>) {
        let Some(size) = size_bytes else {
            return (false, None);
        };

        match ctx.media_type {
            MediaType::Movie => {
                let size_gb = size as f64 / (1024.0 * 1024.0 * 1024.0);
                if let Some(min) = profile.movie_min_size_gb {
                    if size_gb < min {
                        return (
                            true,
                            Some(format!("{:.2} GB below minimum {:.2} GB", size_gb, min)),
                        );
                    }
                }
                if let Some(max) = profile.movie_max_size_gb {
                    if size_gb > max {
                        return (
                            true,
                            Some(format!("{:.2} GB above maximum {:.2} GB", size_gb, max)),
                        );
                    }
                }
                (false, None)
            }
            MediaType::Tv => {
                let is_pack = ctx.is_season_pack || attrs.tv.is_season_pack;
                let per_episode = if is_pack {
                    match ctx.episode_count {
                        Some(count) if count > 0 => size as f64 / count as f64,
                        // unknown episode count: do not reject on size
                        _ => return (false, None),
                    }
                } else {
                    size as f64
                };

                let size_mb = per_episode / (1024.0 * 1024.0);
                if let Some(min) = profile.episode_min_size_mb {
                    if size_mb < min {
                        return (
                            true,
                            Some(format!("{:.0} MB below minimum {:.0} MB", size_mb, min)),
                        );
                    }
                }
                if let Some(max) = profile.episode_max_size_mb {
                    if size_mb > max {
                        return (
                            true,
                            Some(format!("{:.0} MB above maximum {:.0} MB", size_mb, max)),
                        );
                    }
                }
                (false, None)
            }
        }
    }

    /// Upgrade test: scores both titles; the candidate wins iff it is not
    /// banned or size-rejected and improves by at least `max(1,
    /// min_improvement)`.
    pub fn check_upgrade(
        &self,
        existing_title: &str,
        candidate_title: &str,
        profile: &ScoringProfile,
        ctx: &ScoringContext,
        opts: &UpgradeOptions,
    ) -> UpgradeDecision {
        let existing = self.score(existing_title, profile, opts.existing_size, ctx);
        let candidate = self.score(candidate_title, profile, opts.candidate_size, ctx);

        let improvement = candidate.total_score - existing.total_score;
        let threshold = opts.min_improvement.max(1);
        let is_upgrade = !candidate.is_banned
            && !candidate.size_rejected
            && improvement >= threshold;

        UpgradeDecision {
            is_upgrade,
            existing,
            candidate,
            improvement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::default_formats;
    use crate::profiles::best;

    fn scorer() -> Scorer {
        Scorer::new(Arc::new(FormatRegistry::build(default_formats()).unwrap()))
    }

    const GB: i64 = 1024 * 1024 * 1024;

    #[test]
    fn webdl_beats_cam_and_cam_is_banned() {
        let scorer = scorer();
        let profile = best();

        let webdl = scorer.score(
            "Movie.2024.1080p.WEB-DL.DDP5.1-GROUP",
            &profile,
            Some(4 * GB),
            &ScoringContext::movie(),
        );
        let cam = scorer.score(
            "Movie.2024.1080p.CAM-GROUP",
            &profile,
            Some(3 * GB / 2),
            &ScoringContext::movie(),
        );

        assert!(webdl.meets_minimum);
        assert!(!webdl.is_banned);
        assert!(cam.is_banned);
        assert!(!cam.meets_minimum);
        assert_eq!(cam.sort_score(), BANNED_SCORE);
        assert!(webdl.sort_score() > cam.sort_score());
    }

    #[test]
    fn breakdown_sums_to_total() {
        let scorer = scorer();
        let profile = best();
        let result = scorer.score(
            "Movie.2024.2160p.UHD.BluRay.REMUX.DV.TrueHD.Atmos-FRAMESTOR",
            &profile,
            Some(50 * GB),
            &ScoringContext::movie(),
        );

        let breakdown_total: i32 = result.breakdown.values().sum();
        assert_eq!(breakdown_total, result.total_score);
        let format_total: i32 = result.matched_formats.iter().map(|m| m.score).sum();
        assert_eq!(format_total, result.total_score);
    }

    #[test]
    fn score_monotonicity_under_profile_additivity() {
        let scorer = scorer();
        let title = "Movie.2024.1080p.WEB-DL.DDP5.1-GROUP";
        let base = best();
        let base_score = scorer
            .score(title, &base, None, &ScoringContext::movie())
            .total_score;

        // adding a positive mapping for a matched format never decreases
        let mut boosted = best();
        boosted
            .format_scores
            .insert("audio-eac3".to_string(), 1000);
        let boosted_score = scorer
            .score(title, &boosted, None, &ScoringContext::movie())
            .total_score;
        assert!(boosted_score >= base_score);

        // adding a negative mapping never increases
        let mut penalized = best();
        penalized
            .format_scores
            .insert("audio-eac3".to_string(), -1000);
        let penalized_score = scorer
            .score(title, &penalized, None, &ScoringContext::movie())
            .total_score;
        assert!(penalized_score <= base_score);
    }

    #[test]
    fn movie_size_window_is_inclusive() {
        let scorer = scorer();
        let mut profile = best();
        profile.movie_min_size_gb = Some(1.0);
        profile.movie_max_size_gb = Some(4.0);

        let at_min = scorer.score(
            "Movie.2024.1080p.WEB-DL-GROUP",
            &profile,
            Some(GB),
            &ScoringContext::movie(),
        );
        assert!(!at_min.size_rejected);

        let at_max = scorer.score(
            "Movie.2024.1080p.WEB-DL-GROUP",
            &profile,
            Some(4 * GB),
            &ScoringContext::movie(),
        );
        assert!(!at_max.size_rejected);

        let below = scorer.score(
            "Movie.2024.1080p.WEB-DL-GROUP",
            &profile,
            Some(GB / 2),
            &ScoringContext::movie(),
        );
        assert!(below.size_rejected);

        let above = scorer.score(
            "Movie.2024.1080p.WEB-DL-GROUP",
            &profile,
            Some(5 * GB),
            &ScoringContext::movie(),
        );
        assert!(above.size_rejected);
        assert!(above.size_rejection_reason.is_some());
    }

    #[test]
    fn season_pack_size_uses_per_episode_average() {
        let scorer = scorer();
        let mut profile = best();
        profile.episode_min_size_mb = Some(100.0);
        profile.episode_max_size_mb = Some(2000.0);

        // 10 episodes averaging 1 GB each
        let pack = scorer.score(
            "Show.S01.1080p.WEB-DL-GROUP",
            &profile,
            Some(10 * GB),
            &ScoringContext::season_pack(Some(10)),
        );
        assert!(!pack.size_rejected);

        // same total judged as a single episode would be rejected
        let single = scorer.score(
            "Show.S01E01.1080p.WEB-DL-GROUP",
            &profile,
            Some(10 * GB),
            &ScoringContext::episode(),
        );
        assert!(single.size_rejected);

        // unknown episode count: size check skipped
        let unknown = scorer.score(
            "Show.S01.1080p.WEB-DL-GROUP",
            &profile,
            Some(10 * GB),
            &ScoringContext::season_pack(None),
        );
        assert!(!unknown.size_rejected);
    }

    #[test]
    fn pack_bonus_ordering() {
        let scorer = scorer();
        let profile = best();

        let complete = scorer.score(
            "Show.Complete.Series.1080p.WEB-DL-GROUP",
            &profile,
            None,
            &ScoringContext::season_pack(None),
        );
        let multi = scorer.score(
            "Show.S01-S03.1080p.WEB-DL-GROUP",
            &profile,
            None,
            &ScoringContext::season_pack(None),
        );
        let single = scorer.score(
            "Show.S01.1080p.WEB-DL-GROUP",
            &profile,
            None,
            &ScoringContext::season_pack(None),
        );
        let episode = scorer.score(
            "Show.S01E01.1080p.WEB-DL-GROUP",
            &profile,
            None,
            &ScoringContext::episode(),
        );

        assert!(complete.total_score > multi.total_score);
        assert!(multi.total_score > single.total_score);
        assert!(single.total_score > episode.total_score);
    }

    #[test]
    fn upgrade_test_and_antisymmetry() {
        let scorer = scorer();
        let profile = best();
        let opts = UpgradeOptions {
            min_improvement: 100,
            ..Default::default()
        };

        let existing = "Movie.2024.1080p.WEB-DL-GROUP";
        let candidate = "Movie.2024.2160p.UHD.BluRay.REMUX.TrueHD.Atmos-GROUP";

        let forward =
            scorer.check_upgrade(existing, candidate, &profile, &ScoringContext::movie(), &opts);
        assert!(forward.is_upgrade);
        assert!(forward.improvement > 0);

        let backward =
            scorer.check_upgrade(candidate, existing, &profile, &ScoringContext::movie(), &opts);
        assert!(!backward.is_upgrade);
    }

    #[test]
    fn banned_candidate_is_never_an_upgrade() {
        let scorer = scorer();
        let mut profile = best();
        // even with a huge positive score on the banned format
        profile.format_scores.insert("banned-cam".to_string(), 100_000);

        let decision = scorer.check_upgrade(
            "Movie.2024.480p.DVDRip-GROUP",
            "Movie.2024.1080p.CAM-GROUP",
            &profile,
            &ScoringContext::movie(),
            &UpgradeOptions::default(),
        );
        assert!(!decision.is_upgrade);
        assert!(decision.candidate.is_banned);
    }

    #[test]
    fn improvement_below_threshold_is_not_an_upgrade() {
        let scorer = scorer();
        let profile = best();
        let opts = UpgradeOptions {
            min_improvement: 100_000,
            ..Default::default()
        };

        let decision = scorer.check_upgrade(
            "Movie.2024.1080p.WEB-DL-GROUP",
            "Movie.2024.2160p.BluRay.REMUX-GROUP",
            &profile,
            &ScoringContext::movie(),
            &opts,
        );
        assert!(!decision.is_upgrade);
        assert!(decision.improvement > 0);
    }
}
