//! Release parsing, custom-format scoring and acceptance specifications
//!
//! The decision core of Cinephage: a pure title parser, a profile-driven
//! scorer over custom formats, and the composable accept/reject predicates
//! the monitoring tasks run candidates through.

pub mod builtin;
pub mod formats;
pub mod parser;
pub mod profiles;
pub mod scoring;
pub mod specifications;

pub use formats::{
    ConditionKind, CustomFormat, FormatCategory, FormatCondition, FormatRegistry, SharedFormats,
};
pub use parser::{
    parse, AudioAttributes, AudioCodec, Codec, HdrFormat, ReleaseAttributes, Resolution, Source,
    TvAttributes,
};
pub use profiles::{PackPreference, ProfileRegistry, ScoringProfile};
pub use scoring::{
    FormatMatch, MediaType, Scorer, ScoringContext, ScoringResult, UpgradeDecision,
    UpgradeOptions, BANNED_SCORE,
};
pub use specifications::{
    BlocklistSpec, CandidateContext, CutoffUnmetSpec, Decision, DecisionPipeline, DelaySpec,
    DelayVerdict, EpisodeMonitoredSpec, EvaluationContext, ItemContext, MinimumScoreSpec,
    MissingContentSpec, MovieMonitoredSpec, NewEpisodeSpec, PipelineOutcome,
    ProtocolAllowedSpec, RejectionReason, SearchCooldownSpec, SizeSpec, Specification,
    UpgradeableSpec,
};
