//! Release candidate and content-link models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery protocol of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Torrent,
    Usenet,
    Streaming,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Torrent => write!(f, "torrent"),
            Protocol::Usenet => write!(f, "usenet"),
            Protocol::Streaming => write!(f, "streaming"),
        }
    }
}

/// A candidate discovered from an indexer.
///
/// Never mutated after creation; lives only in memory until grabbed,
/// dropped, or cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub guid: String,
    pub title: String,
    pub info_hash: Option<String>,
    pub indexer_id: i32,
    pub indexer_name: String,
    pub protocol: Protocol,
    pub size_bytes: i64,
    pub download_url: Option<String>,
    pub magnet_url: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub seeders: Option<i32>,
    pub leechers: Option<i32>,
}

impl Release {
    pub fn new(
        title: impl Into<String>,
        indexer_id: i32,
        indexer_name: impl Into<String>,
        protocol: Protocol,
        size_bytes: i64,
    ) -> Self {
        let title = title.into();
        Self {
            guid: Uuid::new_v4().to_string(),
            title,
            info_hash: None,
            indexer_id,
            indexer_name: indexer_name.into(),
            protocol,
            size_bytes,
            download_url: None,
            magnet_url: None,
            publish_date: None,
            seeders: None,
            leechers: None,
        }
    }

    pub fn with_info_hash(mut self, hash: impl Into<String>) -> Self {
        self.info_hash = Some(hash.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_magnet_url(mut self, url: impl Into<String>) -> Self {
        self.magnet_url = Some(url.into());
        self
    }

    pub fn with_publish_date(mut self, date: DateTime<Utc>) -> Self {
        self.publish_date = Some(date);
        self
    }

    pub fn with_seeders(mut self, seeders: i32) -> Self {
        self.seeders = Some(seeders);
        self
    }

    pub fn with_leechers(mut self, leechers: i32) -> Self {
        self.leechers = Some(leechers);
        self
    }

    /// Age of the release relative to `now`, if the publish date is known
    pub fn age_hours(&self, now: DateTime<Utc>) -> Option<i64> {
        self.publish_date.map(|d| (now - d).num_hours())
    }

    /// Size in whole-number gigabytes (floating)
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Link between a download artifact and the library content it is for.
///
/// Used as the identity key by the queue, the pending-release delay queue,
/// the blocklist and monitoring history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentRef {
    Movie {
        movie_id: Uuid,
    },
    Episodes {
        series_id: Uuid,
        episode_ids: Vec<Uuid>,
        season_number: Option<i32>,
    },
}

impl ContentRef {
    pub fn movie(movie_id: Uuid) -> Self {
        ContentRef::Movie { movie_id }
    }

    pub fn episodes(series_id: Uuid, episode_ids: Vec<Uuid>, season_number: Option<i32>) -> Self {
        ContentRef::Episodes {
            series_id,
            episode_ids,
            season_number,
        }
    }

    /// Stable string key. Episode ids are sorted so that the same episode
    /// set always produces the same key.
    pub fn key(&self) -> String {
        match self {
            ContentRef::Movie { movie_id } => format!("movie:{}", movie_id),
            ContentRef::Episodes {
                series_id,
                episode_ids,
                ..
            } => {
                let mut ids: Vec<String> =
                    episode_ids.iter().map(|id| id.to_string()).collect();
                ids.sort();
                format!("series:{}:{}", series_id, ids.join(","))
            }
        }
    }

    /// Whether two refs point at overlapping content: the same movie, or the
    /// same series with at least one episode in common.
    pub fn overlaps(&self, other: &ContentRef) -> bool {
        match (self, other) {
            (ContentRef::Movie { movie_id: a }, ContentRef::Movie { movie_id: b }) => a == b,
            (
                ContentRef::Episodes {
                    series_id: a,
                    episode_ids: a_eps,
                    ..
                },
                ContentRef::Episodes {
                    series_id: b,
                    episode_ids: b_eps,
                    ..
                },
            ) => a == b && a_eps.iter().any(|id| b_eps.contains(id)),
            _ => false,
        }
    }

    pub fn movie_id(&self) -> Option<Uuid> {
        match self {
            ContentRef::Movie { movie_id } => Some(*movie_id),
            _ => None,
        }
    }

    pub fn episode_ids(&self) -> &[Uuid] {
        match self {
            ContentRef::Episodes { episode_ids, .. } => episode_ids,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_is_order_independent_for_episodes() {
        let series = Uuid::new_v4();
        let e1 = Uuid::new_v4();
        let e2 = Uuid::new_v4();

        let a = ContentRef::episodes(series, vec![e1, e2], Some(1));
        let b = ContentRef::episodes(series, vec![e2, e1], Some(1));

        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn overlap_requires_shared_episode() {
        let series = Uuid::new_v4();
        let e1 = Uuid::new_v4();
        let e2 = Uuid::new_v4();
        let e3 = Uuid::new_v4();

        let a = ContentRef::episodes(series, vec![e1, e2], Some(1));
        let b = ContentRef::episodes(series, vec![e2, e3], Some(1));
        let c = ContentRef::episodes(series, vec![e3], Some(1));

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn movie_and_episodes_never_overlap() {
        let movie = ContentRef::movie(Uuid::new_v4());
        let eps = ContentRef::episodes(Uuid::new_v4(), vec![Uuid::new_v4()], None);
        assert!(!movie.overlaps(&eps));
    }
}
