//! Search orchestration across indexers
//!
//! Fans a query out over every enabled indexer under a two-tier rate
//! limiter (per indexer + per registrable host), isolates per-indexer
//! failures, deduplicates and ranks the surviving releases, and caches
//! results.

pub mod cache;
pub mod challenge;
pub mod cooldown;
pub mod models;
pub mod orchestrator;
pub mod rate_limit;

pub use cache::{CacheConfig, SearchResultCache};
pub use challenge::{detect_challenge, ChallengeKind};
pub use cooldown::{CooldownConfig, IndexerCooldowns};
pub use models::{
    FailedProvider, IndexerAdapter, IndexerCapabilities, IndexerDefinition, RateLimitConfig,
    SearchCriteria,
};
pub use orchestrator::{OrchestratorConfig, ScoredRelease, SearchOrchestrator, SearchOutcome};
pub use rate_limit::{base_domain, RateLimiterRegistry, SlidingWindowLimiter};
