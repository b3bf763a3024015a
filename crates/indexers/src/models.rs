//! Indexer definitions, search criteria and the adapter interface

use async_trait::async_trait;
use cinephage_core::{DownloadPayload, IndexerErrorKind, Protocol, Release, Result};
use cinephage_decision::MediaType;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// What to search for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub media_type: MediaType,
    pub tmdb_id: i32,
    pub imdb_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub absolute_episode: Option<i32>,
    pub season_pack: bool,
    pub alternative_titles: Vec<String>,
}

impl SearchCriteria {
    pub fn movie(tmdb_id: i32) -> Self {
        Self {
            media_type: MediaType::Movie,
            tmdb_id,
            imdb_id: None,
            title: None,
            year: None,
            season: None,
            episode: None,
            absolute_episode: None,
            season_pack: false,
            alternative_titles: Vec::new(),
        }
    }

    pub fn episode(tmdb_id: i32, season: i32, episode: i32) -> Self {
        Self {
            media_type: MediaType::Tv,
            season: Some(season),
            episode: Some(episode),
            ..Self::movie(tmdb_id)
        }
    }

    pub fn season_pack(tmdb_id: i32, season: i32) -> Self {
        Self {
            media_type: MediaType::Tv,
            season: Some(season),
            season_pack: true,
            ..Self::movie(tmdb_id)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Normalized stable key for caching and per-indexer cooldowns
    pub fn fingerprint(&self) -> String {
        let mut parts = vec![
            match self.media_type {
                MediaType::Movie => "movie".to_string(),
                MediaType::Tv => "tv".to_string(),
            },
            self.tmdb_id.to_string(),
        ];
        if let Some(year) = self.year {
            parts.push(format!("y{}", year));
        }
        if let Some(season) = self.season {
            parts.push(format!("s{}", season));
        }
        if let Some(episode) = self.episode {
            parts.push(format!("e{}", episode));
        }
        if let Some(absolute) = self.absolute_episode {
            parts.push(format!("abs{}", absolute));
        }
        if self.season_pack {
            parts.push("pack".to_string());
        }
        parts.join(":")
    }
}

/// What kinds of queries an indexer can serve
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexerCapabilities {
    pub movie_search: bool,
    pub tv_search: bool,
    pub episode_search: bool,
    pub imdb_search: bool,
}

impl Default for IndexerCapabilities {
    fn default() -> Self {
        Self {
            movie_search: true,
            tv_search: true,
            episode_search: true,
            imdb_search: false,
        }
    }
}

impl IndexerCapabilities {
    /// Capability check for a concrete query
    pub fn supports(&self, criteria: &SearchCriteria) -> bool {
        match criteria.media_type {
            MediaType::Movie => self.movie_search,
            MediaType::Tv => {
                if criteria.episode.is_some() {
                    self.tv_search && self.episode_search
                } else {
                    self.tv_search
                }
            }
        }
    }
}

/// Per-indexer sliding-window rate limit
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub period_secs: u64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 60 requests/minute, burst 10
        Self {
            requests: 60,
            period_secs: 60,
            burst: 10,
        }
    }
}

/// Declarative indexer description. The definition DSL runtime behind it is
/// an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerDefinition {
    pub id: i32,
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
    /// Higher wins ties between equally scored releases
    pub priority: i32,
    pub protocol: Protocol,
    pub capabilities: IndexerCapabilities,
    pub rate_limit: RateLimitConfig,
}

impl IndexerDefinition {
    pub fn new(id: i32, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            base_url: base_url.into(),
            enabled: true,
            priority: 0,
            protocol: Protocol::Torrent,
            capabilities: IndexerCapabilities::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// An indexer protocol adapter. Implementations (Cardigann-style runtimes,
/// API clients) are external collaborators.
#[async_trait]
pub trait IndexerAdapter: Send + Sync {
    fn definition(&self) -> &IndexerDefinition;

    async fn search(
        &self,
        criteria: &SearchCriteria,
        token: &CancellationToken,
    ) -> Result<Vec<Release>>;

    async fn download(&self, release: &Release) -> Result<DownloadPayload>;
}

/// An indexer that failed during a search, with its error class
#[derive(Debug, Clone)]
pub struct FailedProvider {
    pub indexer_id: i32,
    pub indexer: String,
    pub kind: IndexerErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let movie = SearchCriteria::movie(550).with_year(1999);
        assert_eq!(movie.fingerprint(), "movie:550:y1999");
        assert_eq!(movie.fingerprint(), movie.fingerprint());

        let episode = SearchCriteria::episode(100, 2, 5);
        assert_eq!(episode.fingerprint(), "tv:100:s2:e5");

        let pack = SearchCriteria::season_pack(100, 2);
        assert_eq!(pack.fingerprint(), "tv:100:s2:pack");
        assert_ne!(episode.fingerprint(), pack.fingerprint());
    }

    #[test]
    fn capability_check() {
        let mut caps = IndexerCapabilities::default();
        caps.episode_search = false;

        assert!(caps.supports(&SearchCriteria::movie(550)));
        assert!(caps.supports(&SearchCriteria::season_pack(100, 1)));
        assert!(!caps.supports(&SearchCriteria::episode(100, 1, 2)));

        caps.tv_search = false;
        assert!(!caps.supports(&SearchCriteria::season_pack(100, 1)));
    }
}
