//! Indexer failure cooldowns
//!
//! Two scopes: a soft per-(indexer, criteria-fingerprint) cooldown with
//! exponential backoff after consecutive failures, and a whole-indexer
//! pause for protocol failures (captcha, cloudflare).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CooldownConfig {
    /// First-failure backoff; doubles per consecutive failure
    pub base: Duration,
    /// Backoff ceiling
    pub max: Duration,
    /// Whole-indexer pause after a captcha
    pub captcha_pause: Duration,
    /// Whole-indexer pause after a Cloudflare challenge
    pub cloudflare_pause: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            base: Duration::minutes(1),
            max: Duration::hours(1),
            captcha_pause: Duration::minutes(5),
            cloudflare_pause: Duration::minutes(30),
        }
    }
}

#[derive(Debug, Clone)]
struct CooldownState {
    consecutive_failures: u32,
    until: DateTime<Utc>,
}

/// Tracks failure cooldowns. All state is behind one short-held lock.
pub struct IndexerCooldowns {
    config: CooldownConfig,
    fingerprints: Mutex<HashMap<(i32, String), CooldownState>>,
    indexers: Mutex<HashMap<i32, DateTime<Utc>>>,
}

impl IndexerCooldowns {
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            fingerprints: Mutex::new(HashMap::new()),
            indexers: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this (indexer, query) pair should be skipped right now
    pub fn is_cooling(&self, indexer_id: i32, fingerprint: &str, now: DateTime<Utc>) -> bool {
        {
            let indexers = self.indexers.lock().unwrap();
            if let Some(&until) = indexers.get(&indexer_id) {
                if now < until {
                    return true;
                }
            }
        }
        let fingerprints = self.fingerprints.lock().unwrap();
        match fingerprints.get(&(indexer_id, fingerprint.to_string())) {
            Some(state) => now < state.until,
            None => false,
        }
    }

    /// Record a failed query; backoff doubles per consecutive failure,
    /// capped at the configured ceiling. Returns the applied cooldown.
    pub fn record_failure(
        &self,
        indexer_id: i32,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Duration {
        let mut fingerprints = self.fingerprints.lock().unwrap();
        let state = fingerprints
            .entry((indexer_id, fingerprint.to_string()))
            .or_insert(CooldownState {
                consecutive_failures: 0,
                until: now,
            });
        state.consecutive_failures += 1;

        let exponent = state.consecutive_failures.saturating_sub(1).min(10);
        let backoff_ms = self
            .config
            .base
            .num_milliseconds()
            .saturating_mul(1_i64 << exponent);
        let backoff = Duration::milliseconds(backoff_ms).min(self.config.max);
        state.until = now + backoff;

        debug!(
            indexer_id,
            fingerprint,
            failures = state.consecutive_failures,
            backoff_secs = backoff.num_seconds(),
            "indexer query entering cooldown"
        );
        backoff
    }

    /// A successful query clears the fingerprint's failure streak
    pub fn record_success(&self, indexer_id: i32, fingerprint: &str) {
        let mut fingerprints = self.fingerprints.lock().unwrap();
        fingerprints.remove(&(indexer_id, fingerprint.to_string()));
    }

    /// Pause the whole indexer (protocol failures)
    pub fn pause_indexer(&self, indexer_id: i32, pause: Duration, now: DateTime<Utc>) {
        let mut indexers = self.indexers.lock().unwrap();
        let until = now + pause;
        let entry = indexers.entry(indexer_id).or_insert(until);
        if *entry < until {
            *entry = until;
        }
        debug!(indexer_id, until = %until, "indexer paused");
    }

    pub fn captcha_pause(&self) -> Duration {
        self.config.captcha_pause
    }

    pub fn cloudflare_pause(&self) -> Duration {
        self.config.cloudflare_pause
    }
}

impl Default for IndexerCooldowns {
    fn default() -> Self {
        Self::new(CooldownConfig::default())
    }
}
