//! Scoring profiles
//!
//! A profile is a flat table of per-format scores plus thresholds. There is
//! no profile hierarchy; the built-ins are immutable and user profiles may
//! override their scores.

use cinephage_core::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Season-pack bonus configuration. Complete series outranks multi-season
/// outranks single season; individual episodes get no bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackPreference {
    pub enabled: bool,
    pub complete_series_bonus: i32,
    pub multi_season_bonus: i32,
    pub single_season_bonus: i32,
    /// A pack is only grabbed when at least this share of its episodes is
    /// still wanted
    pub min_wanted_episodes_percent: u8,
}

impl Default for PackPreference {
    fn default() -> Self {
        Self {
            enabled: true,
            complete_series_bonus: 500,
            multi_season_bonus: 300,
            single_season_bonus: 150,
            min_wanted_episodes_percent: 60,
        }
    }
}

/// A named collection of per-format score assignments plus thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub id: String,
    pub name: String,
    pub upgrades_allowed: bool,
    pub min_score: i32,
    /// Cutoff; `-1` or `0` means no cutoff
    pub upgrade_until_score: i32,
    pub min_score_increment: i32,
    pub movie_min_size_gb: Option<f64>,
    pub movie_max_size_gb: Option<f64>,
    pub episode_min_size_mb: Option<f64>,
    pub episode_max_size_mb: Option<f64>,
    pub pack_preference: PackPreference,
    pub allowed_protocols: Vec<Protocol>,
    /// format id -> score; missing entries contribute zero
    pub format_scores: HashMap<String, i32>,
}

impl ScoringProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            upgrades_allowed: true,
            min_score: 0,
            upgrade_until_score: 0,
            min_score_increment: 1,
            movie_min_size_gb: None,
            movie_max_size_gb: None,
            episode_min_size_mb: None,
            episode_max_size_mb: None,
            pack_preference: PackPreference::default(),
            allowed_protocols: vec![Protocol::Torrent, Protocol::Usenet],
            format_scores: HashMap::new(),
        }
    }

    pub fn has_cutoff(&self) -> bool {
        self.upgrade_until_score > 0
    }

    pub fn score_for(&self, format_id: &str) -> i32 {
        self.format_scores.get(format_id).copied().unwrap_or(0)
    }

    pub fn allows_protocol(&self, protocol: Protocol) -> bool {
        self.allowed_protocols.contains(&protocol)
    }

    pub fn with_score(mut self, format_id: impl Into<String>, score: i32) -> Self {
        self.format_scores.insert(format_id.into(), score);
        self
    }
}

/// Score table shared by the built-in profiles, tweaked per profile
fn base_scores() -> HashMap<String, i32> {
    let table: &[(&str, i32)] = &[
        ("res-2160p", 5000),
        ("res-1080p", 2500),
        ("res-720p", 800),
        ("res-480p", 100),
        ("remux", 8000),
        ("source-bluray", 2500),
        ("source-webdl", 1500),
        ("source-webrip", 300),
        ("source-hdtv", -300),
        ("source-dvd", -500),
        ("banned-cam", -10000),
        ("banned-telesync", -10000),
        ("banned-screener", -10000),
        ("hdr-dv-hdr10plus", 900),
        ("hdr-dv", 700),
        ("hdr-hdr10plus", 600),
        ("hdr-hdr10", 500),
        ("hdr-generic", 300),
        ("hdr-hlg", 100),
        ("audio-truehd-atmos", 1500),
        ("audio-truehd", 1200),
        ("audio-dtshd-ma", 2600),
        ("audio-dtsx", 1000),
        ("audio-eac3", 300),
        ("audio-flac", 200),
        ("codec-av1", 150),
        ("codec-x265", 100),
        ("codec-x264", 50),
        ("codec-xvid", -800),
        ("stream-amzn", 200),
        ("stream-nf", 200),
        ("stream-atvp", 250),
        ("stream-dsnp", 150),
        ("stream-max", 150),
        ("group-tier-1", 800),
        ("group-tier-2", 400),
        ("micro-encoders", -2000),
        ("repack", 50),
        ("proper", 50),
        ("low-3d", -1500),
    ];
    table
        .iter()
        .map(|(id, score)| (id.to_string(), *score))
        .collect()
}

/// *Best*: maximum quality, remux-first, generous size windows
pub fn best() -> ScoringProfile {
    let mut profile = ScoringProfile::new("best", "Best");
    profile.format_scores = base_scores();
    profile.min_score = 0;
    profile.upgrade_until_score = 0;
    profile.min_score_increment = 1;
    profile.movie_min_size_gb = Some(1.0);
    profile.movie_max_size_gb = Some(120.0);
    profile.episode_min_size_mb = Some(100.0);
    profile.episode_max_size_mb = Some(10_000.0);
    profile
}

/// *Efficient*: WEB-DL x265 sweet spot, remux discouraged
pub fn efficient() -> ScoringProfile {
    let mut profile = ScoringProfile::new("efficient", "Efficient");
    let mut scores = base_scores();
    scores.insert("remux".to_string(), -2000);
    scores.insert("source-webdl".to_string(), 2500);
    scores.insert("source-bluray".to_string(), 1500);
    scores.insert("codec-x265".to_string(), 800);
    scores.insert("codec-av1".to_string(), 600);
    scores.insert("res-2160p".to_string(), 2000);
    scores.insert("res-1080p".to_string(), 3000);
    profile.format_scores = scores;
    profile.movie_min_size_gb = Some(0.8);
    profile.movie_max_size_gb = Some(25.0);
    profile.episode_min_size_mb = Some(80.0);
    profile.episode_max_size_mb = Some(3_000.0);
    profile
}

/// *Micro*: smallest acceptable encodes
pub fn micro() -> ScoringProfile {
    let mut profile = ScoringProfile::new("micro", "Micro");
    let mut scores = base_scores();
    scores.insert("remux".to_string(), -5000);
    scores.insert("micro-encoders".to_string(), 1500);
    scores.insert("codec-x265".to_string(), 1200);
    scores.insert("res-2160p".to_string(), 500);
    scores.insert("res-1080p".to_string(), 2000);
    scores.insert("res-720p".to_string(), 1200);
    profile.format_scores = scores;
    profile.movie_min_size_gb = Some(0.3);
    profile.movie_max_size_gb = Some(6.0);
    profile.episode_min_size_mb = Some(40.0);
    profile.episode_max_size_mb = Some(800.0);
    profile
}

/// Registry of profiles with a hot-swap discipline: the scheduler re-reads
/// it each tick, so edits are observed within one task tick.
pub struct ProfileRegistry {
    inner: RwLock<HashMap<String, ScoringProfile>>,
}

impl ProfileRegistry {
    /// Registry seeded with the immutable built-ins
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in [best(), efficient(), micro()] {
            profiles.insert(profile.id.clone(), profile);
        }
        Self {
            inner: RwLock::new(profiles),
        }
    }

    pub fn get(&self, id: &str) -> Option<ScoringProfile> {
        self.inner.read().unwrap().get(id).cloned()
    }

    pub fn upsert(&self, profile: ScoringProfile) {
        self.inner
            .write()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub fn list(&self) -> Vec<ScoringProfile> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Replace the whole set under a write-exclusive swap
    pub fn replace_all(&self, profiles: Vec<ScoringProfile>) {
        let mut map = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            map.insert(profile.id.clone(), profile);
        }
        *self.inner.write().unwrap() = map;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = ProfileRegistry::builtin();
        assert!(registry.get("best").is_some());
        assert!(registry.get("efficient").is_some());
        assert!(registry.get("micro").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn user_profile_overrides_builtin_scores() {
        let registry = ProfileRegistry::builtin();
        let mut custom = best();
        custom.id = "my-best".to_string();
        custom.format_scores.insert("remux".to_string(), 0);
        registry.upsert(custom);

        assert_eq!(registry.get("my-best").unwrap().score_for("remux"), 0);
        // the builtin itself is untouched
        assert_eq!(registry.get("best").unwrap().score_for("remux"), 8000);
    }

    #[test]
    fn cutoff_semantics() {
        let mut profile = best();
        assert!(!profile.has_cutoff());
        profile.upgrade_until_score = -1;
        assert!(!profile.has_cutoff());
        profile.upgrade_until_score = 15000;
        assert!(profile.has_cutoff());
    }

    #[test]
    fn missing_format_scores_contribute_zero() {
        let profile = best();
        assert_eq!(profile.score_for("nonexistent-format"), 0);
    }
}
