//! Parallel search orchestration
//!
//! Queries every eligible indexer in parallel under the two-tier rate
//! limiter with a global parallelism cap, isolates per-indexer failures,
//! then deduplicates, scores and ranks what came back. Raw result sets are
//! cached; protocol failures pause the offending indexer.

use crate::cache::SearchResultCache;
use crate::cooldown::IndexerCooldowns;
use crate::models::{FailedProvider, IndexerAdapter, SearchCriteria};
use crate::rate_limit::RateLimiterRegistry;
use cinephage_core::{CinephageError, IndexerErrorKind, Protocol, Release, Result};
use cinephage_decision::{
    MediaType, Scorer, ScoringContext, ScoringProfile, ScoringResult, SharedFormats,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Global cap on concurrently querying indexers
    pub max_parallelism: usize,
    /// Per-indexer request deadline
    pub indexer_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 8,
            indexer_timeout: Duration::from_secs(30),
        }
    }
}

/// A deduplicated release with its score and the indexers that carried it
#[derive(Debug, Clone)]
pub struct ScoredRelease {
    pub release: Release,
    pub score: ScoringResult,
    pub indexers: Vec<String>,
    pub indexer_priority: i32,
}

/// What a search produced
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Full ranked list, for diagnostics
    pub releases: Vec<ScoredRelease>,
    /// Top surviving candidate
    pub chosen: Option<ScoredRelease>,
    /// Indexer that supplied the chosen release
    pub provider: Option<String>,
    pub failed_providers: Vec<FailedProvider>,
    /// Set when every eligible indexer failed
    pub error: Option<String>,
    pub from_cache: bool,
}

/// Fans a query out across registered indexer adapters
pub struct SearchOrchestrator {
    config: OrchestratorConfig,
    adapters: RwLock<Vec<Arc<dyn IndexerAdapter>>>,
    limiter: Arc<RateLimiterRegistry>,
    cache: Arc<SearchResultCache>,
    cooldowns: Arc<IndexerCooldowns>,
    formats: Arc<SharedFormats>,
    semaphore: Arc<Semaphore>,
}

impl SearchOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        limiter: Arc<RateLimiterRegistry>,
        cache: Arc<SearchResultCache>,
        cooldowns: Arc<IndexerCooldowns>,
        formats: Arc<SharedFormats>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallelism));
        Self {
            config,
            adapters: RwLock::new(Vec::new()),
            limiter,
            cache,
            cooldowns,
            formats,
            semaphore,
        }
    }

    /// Adapters are registered explicitly at init, never via side effects
    pub fn register(&self, adapter: Arc<dyn IndexerAdapter>) {
        self.adapters.write().unwrap().push(adapter);
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().unwrap().len()
    }

    /// Fetch the download payload for a release from the indexer that
    /// supplied it.
    pub async fn download(&self, release: &Release) -> Result<cinephage_core::DownloadPayload> {
        let adapter = {
            let adapters = self.adapters.read().unwrap();
            adapters
                .iter()
                .find(|a| a.definition().id == release.indexer_id)
                .cloned()
        };
        match adapter {
            Some(adapter) => adapter.download(release).await,
            None => Err(CinephageError::NotFound {
                resource: format!("indexer {}", release.indexer_id),
            }),
        }
    }

    /// Search all eligible indexers and return the ranked, deduplicated
    /// result set under the given profile.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        profile: &ScoringProfile,
        token: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let fingerprint = criteria.fingerprint();
        let now = Utc::now();

        let eligible: Vec<Arc<dyn IndexerAdapter>> = {
            let adapters = self.adapters.read().unwrap();
            adapters
                .iter()
                .filter(|adapter| {
                    let def = adapter.definition();
                    def.enabled
                        && def.capabilities.supports(criteria)
                        && !self.cooldowns.is_cooling(def.id, &fingerprint, now)
                })
                .cloned()
                .collect()
        };

        if eligible.is_empty() {
            debug!(fingerprint = %fingerprint, "no eligible indexers for query");
            return Ok(SearchOutcome::default());
        }

        let indexer_ids: Vec<i32> = eligible.iter().map(|a| a.definition().id).collect();
        let cache_key = SearchResultCache::key(&fingerprint, &indexer_ids, &profile.id);

        if let Some(raw) = self.cache.get(cache_key).await {
            debug!(fingerprint = %fingerprint, results = raw.len(), "search cache hit");
            let mut outcome = self.rank(raw, criteria, profile, &eligible);
            outcome.from_cache = true;
            return Ok(outcome);
        }

        let (raw, failed_providers) = self.fan_out(&eligible, criteria, token).await?;

        if raw.is_empty() && !failed_providers.is_empty() && failed_providers.len() == eligible.len()
        {
            // every provider failed; nothing cached
            let summary = failed_providers
                .iter()
                .map(|f| format!("{}: {}", f.indexer, f.message))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(fingerprint = %fingerprint, "all indexers failed: {}", summary);
            return Ok(SearchOutcome {
                failed_providers,
                error: Some(summary),
                ..Default::default()
            });
        }

        self.cache.put(cache_key, raw.clone()).await;

        let mut outcome = self.rank(raw, criteria, profile, &eligible);
        outcome.failed_providers = failed_providers;
        info!(
            fingerprint = %fingerprint,
            results = outcome.releases.len(),
            failed = outcome.failed_providers.len(),
            chosen = outcome.provider.as_deref().unwrap_or("none"),
            "search completed"
        );
        Ok(outcome)
    }

    async fn fan_out(
        &self,
        eligible: &[Arc<dyn IndexerAdapter>],
        criteria: &SearchCriteria,
        token: &CancellationToken,
    ) -> Result<(Vec<Release>, Vec<FailedProvider>)> {
        let mut handles = Vec::with_capacity(eligible.len());

        for adapter in eligible {
            let adapter = adapter.clone();
            let definition = adapter.definition().clone();
            let criteria = criteria.clone();
            let limiter = self.limiter.clone();
            let semaphore = self.semaphore.clone();
            let child = token.child_token();
            let timeout = self.config.indexer_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    CinephageError::Cancelled {
                        operation: "indexer search".to_string(),
                    }
                })?;

                limiter.acquire(&definition, &child).await?;

                tokio::select! {
                    _ = child.cancelled() => Err(CinephageError::Cancelled {
                        operation: format!("search on {}", definition.name),
                    }),
                    result = tokio::time::timeout(timeout, adapter.search(&criteria, &child)) => {
                        match result {
                            Ok(inner) => inner,
                            Err(_) => Err(CinephageError::Timeout {
                                operation: format!("search on {}", definition.name),
                            }),
                        }
                    }
                }
            }));
        }

        let fingerprint = criteria.fingerprint();
        let mut raw = Vec::new();
        let mut failed = Vec::new();

        for (adapter, handle) in eligible.iter().zip(handles) {
            let definition = adapter.definition();
            let result = handle.await.unwrap_or_else(|join_err| {
                Err(CinephageError::ExternalServiceError {
                    service: definition.name.clone(),
                    error: join_err.to_string(),
                })
            });

            match result {
                Ok(releases) => {
                    self.cooldowns.record_success(definition.id, &fingerprint);
                    debug!(indexer = %definition.name, results = releases.len(), "indexer responded");
                    raw.extend(releases);
                }
                Err(err @ CinephageError::Cancelled { .. }) => {
                    // unwound by the caller; don't punish the indexer
                    return Err(err);
                }
                Err(err) => {
                    let now = Utc::now();
                    let kind = match &err {
                        CinephageError::IndexerError { kind, .. } => *kind,
                        CinephageError::Timeout { .. } => IndexerErrorKind::Network,
                        _ => IndexerErrorKind::Internal,
                    };
                    match kind {
                        IndexerErrorKind::Captcha => {
                            self.cooldowns.pause_indexer(
                                definition.id,
                                self.cooldowns.captcha_pause(),
                                now,
                            );
                        }
                        IndexerErrorKind::Cloudflare | IndexerErrorKind::Auth => {
                            self.cooldowns.pause_indexer(
                                definition.id,
                                self.cooldowns.cloudflare_pause(),
                                now,
                            );
                        }
                        _ => {
                            self.cooldowns
                                .record_failure(definition.id, &fingerprint, now);
                        }
                    }
                    warn!(indexer = %definition.name, error = %err, "indexer failed");
                    failed.push(FailedProvider {
                        indexer_id: definition.id,
                        indexer: definition.name.clone(),
                        kind,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok((raw, failed))
    }

    /// Dedup, score and rank a raw release list
    fn rank(
        &self,
        raw: Vec<Release>,
        criteria: &SearchCriteria,
        profile: &ScoringProfile,
        eligible: &[Arc<dyn IndexerAdapter>],
    ) -> SearchOutcome {
        let priorities: HashMap<i32, i32> = eligible
            .iter()
            .map(|a| (a.definition().id, a.definition().priority))
            .collect();

        let deduped = dedup_releases(raw);

        let scorer = Scorer::new(self.formats.get());
        let scoring_ctx = ScoringContext {
            media_type: criteria.media_type,
            is_season_pack: criteria.season_pack,
            // episode counts are resolved by the monitoring layer
            episode_count: None,
        };

        let mut releases: Vec<ScoredRelease> = deduped
            .into_iter()
            .map(|(release, indexers)| {
                let score = scorer.score(
                    &release.title,
                    profile,
                    Some(release.size_bytes),
                    &scoring_ctx,
                );
                let indexer_priority = priorities.get(&release.indexer_id).copied().unwrap_or(0);
                ScoredRelease {
                    release,
                    score,
                    indexers,
                    indexer_priority,
                }
            })
            .collect();

        releases.sort_by(|a, b| {
            a.score
                .is_banned
                .cmp(&b.score.is_banned)
                .then_with(|| b.score.sort_score().cmp(&a.score.sort_score()))
                .then_with(|| {
                    let a_seeders = seeders_for_ranking(&a.release);
                    let b_seeders = seeders_for_ranking(&b.release);
                    b_seeders.cmp(&a_seeders)
                })
                .then_with(|| b.indexer_priority.cmp(&a.indexer_priority))
                .then_with(|| b.release.publish_date.cmp(&a.release.publish_date))
        });

        let chosen = releases
            .iter()
            .find(|r| !r.score.is_banned && r.score.meets_minimum)
            .cloned();
        let provider = chosen
            .as_ref()
            .and_then(|r| r.indexers.first().cloned());

        SearchOutcome {
            releases,
            chosen,
            provider,
            failed_providers: Vec::new(),
            error: None,
            from_cache: false,
        }
    }
}

fn seeders_for_ranking(release: &Release) -> i32 {
    match release.protocol {
        Protocol::Torrent => release.seeders.unwrap_or(0),
        _ => 0,
    }
}

/// Lowercased title with non-alphanumerics collapsed to single spaces
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

fn sizes_within_one_percent(a: i64, b: i64) -> bool {
    let larger = a.max(b).max(1) as f64;
    ((a - b).abs() as f64) / larger <= 0.01
}

/// Merge duplicates: same info hash (case-insensitive), or same normalized
/// title with sizes within one percent. The survivor is the copy with the
/// most seeders (torrent) or the earliest publish date (usenet); indexer
/// sets are merged.
fn dedup_releases(raw: Vec<Release>) -> Vec<(Release, Vec<String>)> {
    struct Entry {
        release: Release,
        indexers: Vec<String>,
    }

    let mut entries: Vec<Entry> = Vec::new();
    let mut by_hash: HashMap<String, usize> = HashMap::new();
    let mut by_title: HashMap<String, Vec<usize>> = HashMap::new();

    fn merge(entry: &mut Entry, incoming: Release) {
        if !entry.indexers.contains(&incoming.indexer_name) {
            entry.indexers.push(incoming.indexer_name.clone());
        }
        let incoming_wins = match incoming.protocol {
            Protocol::Torrent => incoming.seeders.unwrap_or(0) > entry.release.seeders.unwrap_or(0),
            _ => match (incoming.publish_date, entry.release.publish_date) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if incoming_wins {
            entry.release = incoming;
        }
    }

    for release in raw {
        let hash_key = release
            .info_hash
            .as_deref()
            .map(|hash| hash.to_ascii_lowercase());

        if let Some(key) = &hash_key {
            if let Some(&idx) = by_hash.get(key) {
                merge(&mut entries[idx], release);
                continue;
            }
        }

        let title_key = normalize_title(&release.title);
        let title_match = by_title.get(&title_key).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                .find(|&idx| {
                    sizes_within_one_percent(entries[idx].release.size_bytes, release.size_bytes)
                })
        });

        if let Some(idx) = title_match {
            if let Some(key) = hash_key {
                by_hash.entry(key).or_insert(idx);
            }
            merge(&mut entries[idx], release);
            continue;
        }

        let idx = entries.len();
        if let Some(key) = hash_key {
            by_hash.insert(key, idx);
        }
        by_title.entry(title_key).or_default().push(idx);
        let indexers = vec![release.indexer_name.clone()];
        entries.push(Entry { release, indexers });
    }

    entries
        .into_iter()
        .map(|entry| (entry.release, entry.indexers))
        .collect()
}
