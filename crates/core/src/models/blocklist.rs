//! Blocklist domain model

use super::release::{ContentRef, Release};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a release was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    DownloadFailed,
    ImportFailed,
    QualityMismatch,
    Manual,
    Duplicate,
    BadRelease,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DownloadFailed => write!(f, "download_failed"),
            BlockReason::ImportFailed => write!(f, "import_failed"),
            BlockReason::QualityMismatch => write!(f, "quality_mismatch"),
            BlockReason::Manual => write!(f, "manual"),
            BlockReason::Duplicate => write!(f, "duplicate"),
            BlockReason::BadRelease => write!(f, "bad_release"),
        }
    }
}

/// A (release identity, content link) pair that must not be grabbed again
/// until expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub id: Uuid,
    /// Exact source title of the blocked release
    pub title: String,
    pub info_hash: Option<String>,
    pub indexer_id: Option<i32>,
    pub content: ContentRef,
    pub reason: BlockReason,
    pub message: Option<String>,
    /// `None` means the entry never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BlocklistEntry {
    pub fn new(release: &Release, content: ContentRef, reason: BlockReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: release.title.clone(),
            info_hash: release.info_hash.clone(),
            indexer_id: Some(release.indexer_id),
            content,
            reason,
            message: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// An entry is live until its expiry passes
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }

    /// A release is blocked by this entry when the entry is live, the
    /// content links overlap, and the release identity matches by info hash
    /// (primary) or by exact source title (fallback).
    pub fn matches(&self, release: &Release, content: &ContentRef, now: DateTime<Utc>) -> bool {
        if !self.is_live(now) || !self.content.overlaps(content) {
            return false;
        }
        match (&self.info_hash, &release.info_hash) {
            (Some(blocked), Some(candidate)) => blocked.eq_ignore_ascii_case(candidate),
            _ => self.title == release.title,
        }
    }
}
