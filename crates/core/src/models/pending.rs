//! Pending-release delay queue model

use super::release::{ContentRef, Release};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rows older than this are dropped regardless of status.
pub const MAX_PENDING_AGE_HOURS: i64 = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Grabbed,
    Superseded,
    Expired,
}

impl std::fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingStatus::Pending => write!(f, "pending"),
            PendingStatus::Grabbed => write!(f, "grabbed"),
            PendingStatus::Superseded => write!(f, "superseded"),
            PendingStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A release waiting out a delay window before being dispatched.
///
/// At most one `Pending` row exists per content key; a higher-scoring
/// arrival supersedes the old row rather than sitting next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRelease {
    pub id: Uuid,
    pub release: Release,
    pub content: ContentRef,
    pub profile_id: String,
    pub score: i32,
    pub is_upgrade: bool,
    pub process_at: DateTime<Utc>,
    pub status: PendingStatus,
    pub superseded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingRelease {
    pub fn new(
        release: Release,
        content: ContentRef,
        profile_id: impl Into<String>,
        score: i32,
        process_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            release,
            content,
            profile_id: profile_id.into(),
            score,
            is_upgrade: false,
            process_at,
            status: PendingStatus::Pending,
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_upgrade(mut self, is_upgrade: bool) -> Self {
        self.is_upgrade = is_upgrade;
        self
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PendingStatus::Pending && self.process_at <= now
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(MAX_PENDING_AGE_HOURS)
    }

    pub fn mark_superseded(&mut self, by: Uuid) {
        self.status = PendingStatus::Superseded;
        self.superseded_by = Some(by);
        self.updated_at = Utc::now();
    }

    pub fn mark_grabbed(&mut self) {
        self.status = PendingStatus::Grabbed;
        self.updated_at = Utc::now();
    }

    pub fn mark_expired(&mut self) {
        self.status = PendingStatus::Expired;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::release::Protocol;

    fn pending(score: i32, process_at: DateTime<Utc>) -> PendingRelease {
        let release = Release::new(
            "Movie.2024.1080p.WEB-DL-GROUP",
            1,
            "alpha",
            Protocol::Torrent,
            4_000_000_000,
        );
        PendingRelease::new(
            release,
            ContentRef::movie(Uuid::new_v4()),
            "best",
            score,
            process_at,
        )
    }

    #[test]
    fn due_only_when_pending_and_past_process_at() {
        let now = Utc::now();
        let mut p = pending(100, now - Duration::minutes(1));
        assert!(p.is_due(now));

        p.mark_grabbed();
        assert!(!p.is_due(now));

        let future = pending(100, now + Duration::minutes(30));
        assert!(!future.is_due(now));
    }

    #[test]
    fn supersede_records_successor() {
        let now = Utc::now();
        let mut old = pending(100, now + Duration::hours(1));
        let new = pending(250, now + Duration::hours(1));

        old.mark_superseded(new.id);
        assert_eq!(old.status, PendingStatus::Superseded);
        assert_eq!(old.superseded_by, Some(new.id));
    }
}
