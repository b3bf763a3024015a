//! Two-tier sliding-window rate limiting
//!
//! Tier one is per indexer, tier two is per registrable host, so indexers
//! behind subdomains of the same site contend for one host bucket. Both
//! tiers clean old timestamps and count under the same lock; acquisition
//! waits the longer of the two tiers and records on both atomically.

use crate::models::{IndexerDefinition, RateLimitConfig};
use cinephage_core::{CinephageError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

/// Multi-part TLDs that must keep three labels in the registrable domain
const MULTI_PART_TLDS: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "co.nz",
    "org.nz", "co.jp", "ne.jp", "com.br", "com.mx", "co.in", "co.za", "com.sg", "com.tr",
];

/// Registrable base domain used as the host bucket key. Handles multi-part
/// TLDs like `.co.uk`; IP literals are used as-is.
pub fn base_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    if host.parse::<std::net::IpAddr>().is_ok() {
        return Some(host);
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return Some(host);
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let take = if MULTI_PART_TLDS.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    Some(labels[labels.len() - take.min(labels.len())..].join("."))
}

/// A sliding-window counter: at most `requests + burst` requests in any
/// window of `period`.
pub struct SlidingWindowLimiter {
    requests: u32,
    burst: u32,
    period: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: config.requests,
            burst: config.burst,
            period: Duration::from_secs(config.period_secs),
            timestamps: VecDeque::new(),
        }
    }

    fn limit(&self) -> usize {
        (self.requests + self.burst) as usize
    }

    /// Drop timestamps older than the window. Must run under the same lock
    /// as the checks below.
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn can_proceed(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.timestamps.len() < self.limit()
    }

    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// Time until the oldest timestamp leaves the window, clamped to zero
    pub fn wait_time(&mut self, now: Instant) -> Duration {
        self.prune(now);
        if self.timestamps.len() < self.limit() {
            return Duration::ZERO;
        }
        match self.timestamps.front() {
            Some(&oldest) => (oldest + self.period).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Requests currently inside the window
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.timestamps.len()
    }
}

/// The two-tier limiter registry: one lock per indexer and one per host
/// key, created on demand.
pub struct RateLimiterRegistry {
    host_config: RateLimitConfig,
    indexers: Mutex<HashMap<i32, Arc<Mutex<SlidingWindowLimiter>>>>,
    hosts: Mutex<HashMap<String, Arc<Mutex<SlidingWindowLimiter>>>>,
}

impl RateLimiterRegistry {
    pub fn new(host_config: RateLimitConfig) -> Self {
        Self {
            host_config,
            indexers: Mutex::new(HashMap::new()),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    async fn indexer_limiter(
        &self,
        definition: &IndexerDefinition,
    ) -> Arc<Mutex<SlidingWindowLimiter>> {
        let mut map = self.indexers.lock().await;
        map.entry(definition.id)
            .or_insert_with(|| Arc::new(Mutex::new(SlidingWindowLimiter::new(definition.rate_limit))))
            .clone()
    }

    async fn host_limiter(&self, host_key: &str) -> Arc<Mutex<SlidingWindowLimiter>> {
        let mut map = self.hosts.lock().await;
        map.entry(host_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SlidingWindowLimiter::new(self.host_config))))
            .clone()
    }

    /// Wait until both tiers admit a request, then record it on both.
    ///
    /// The check and the record happen while holding both limiter locks
    /// (indexer first, then host) so concurrent acquirers can never push a
    /// window past its limit. Sleeps happen with no lock held.
    pub async fn acquire(
        &self,
        definition: &IndexerDefinition,
        token: &CancellationToken,
    ) -> Result<()> {
        let host_key = base_domain(&definition.base_url)
            .unwrap_or_else(|| definition.base_url.clone());
        let indexer_limiter = self.indexer_limiter(definition).await;
        let host_limiter = self.host_limiter(&host_key).await;

        loop {
            let wait = {
                let mut indexer = indexer_limiter.lock().await;
                let mut host = host_limiter.lock().await;
                let now = Instant::now();

                let indexer_wait = indexer.wait_time(now);
                let host_wait = host.wait_time(now);
                let wait = indexer_wait.max(host_wait);

                if wait.is_zero() {
                    indexer.record(now);
                    host.record(now);
                    trace!(
                        indexer = %definition.name,
                        host = %host_key,
                        "rate limit slot acquired"
                    );
                    return Ok(());
                }
                wait
            };

            debug!(
                indexer = %definition.name,
                host = %host_key,
                wait_ms = wait.as_millis() as u64,
                "rate limited, waiting"
            );

            tokio::select! {
                _ = token.cancelled() => {
                    return Err(CinephageError::Cancelled {
                        operation: format!("rate limit wait for {}", definition.name),
                    });
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Wait on the host bucket alone and record a request on it. Used for
    /// calls that are not tied to an indexer, like download-client
    /// dispatches.
    pub async fn acquire_host(&self, host_key: &str, token: &CancellationToken) -> Result<()> {
        let limiter = self.host_limiter(host_key).await;
        loop {
            let wait = {
                let mut host = limiter.lock().await;
                let now = Instant::now();
                let wait = host.wait_time(now);
                if wait.is_zero() {
                    host.record(now);
                    return Ok(());
                }
                wait
            };

            tokio::select! {
                _ = token.cancelled() => {
                    return Err(CinephageError::Cancelled {
                        operation: format!("rate limit wait for host {}", host_key),
                    });
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Requests currently in the host window, for introspection and tests
    pub async fn host_in_window(&self, host_key: &str) -> usize {
        let limiter = self.host_limiter(host_key).await;
        let mut limiter = limiter.lock().await;
        limiter.in_window(Instant::now())
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        // default host limit: 30/minute, burst 5
        Self::new(RateLimitConfig {
            requests: 30,
            period_secs: 60,
            burst: 5,
        })
    }
}
