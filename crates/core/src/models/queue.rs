//! Queue domain model for downloads in flight

use super::release::{ContentRef, Protocol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consecutive import failures tolerated before the item is failed and
/// blocklisted.
pub const MAX_IMPORT_ATTEMPTS: u32 = 3;

/// Status of a queue item.
///
/// The lifecycle is linear: `Queued -> Downloading <-> Paused -> Completed
/// -> Importing -> Imported`, with `Failed` and `Removed` as terminal states
/// reachable from any non-terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Importing,
    Imported,
    Failed,
    Removed,
}

impl QueueStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueStatus::Imported | QueueStatus::Failed | QueueStatus::Removed
        )
    }

    /// Legal forward transitions
    pub fn can_transition_to(self, next: QueueStatus) -> bool {
        use QueueStatus::*;
        if self == next {
            return false;
        }
        match (self, next) {
            (_, Failed) | (_, Removed) if !self.is_terminal() => true,
            (Queued, Downloading) | (Queued, Completed) => true,
            (Downloading, Paused) | (Downloading, Completed) => true,
            (Paused, Downloading) | (Paused, Completed) => true,
            (Completed, Importing) => true,
            (Importing, Imported) => true,
            // a failed import retries from Importing back to Completed
            (Importing, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Queued => write!(f, "queued"),
            QueueStatus::Downloading => write!(f, "downloading"),
            QueueStatus::Paused => write!(f, "paused"),
            QueueStatus::Completed => write!(f, "completed"),
            QueueStatus::Importing => write!(f, "importing"),
            QueueStatus::Imported => write!(f, "imported"),
            QueueStatus::Failed => write!(f, "failed"),
            QueueStatus::Removed => write!(f, "removed"),
        }
    }
}

/// A download in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub download_client_id: String,
    /// The download client's native id (torrent hash, nzb id)
    pub download_id: Option<String>,
    pub info_hash: Option<String>,
    pub title: String,
    pub content: ContentRef,
    pub protocol: Protocol,
    pub indexer_id: i32,
    pub size_bytes: i64,
    pub status: QueueStatus,

    // Live stats from the client
    pub progress: f64, // 0.0 to 1.0
    pub download_speed: u64,
    pub upload_speed: u64,
    pub eta_seconds: Option<i64>,
    pub ratio: f64,

    pub is_upgrade: bool,
    pub import_attempts: u32,
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(
        download_client_id: impl Into<String>,
        title: impl Into<String>,
        content: ContentRef,
        protocol: Protocol,
        indexer_id: i32,
        size_bytes: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            download_client_id: download_client_id.into(),
            download_id: None,
            info_hash: None,
            title: title.into(),
            content,
            protocol,
            indexer_id,
            size_bytes,
            status: QueueStatus::Queued,
            progress: 0.0,
            download_speed: 0,
            upload_speed: 0,
            eta_seconds: None,
            ratio: 0.0,
            is_upgrade: false,
            import_attempts: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_download_id(mut self, id: impl Into<String>) -> Self {
        self.download_id = Some(id.into());
        self
    }

    pub fn with_info_hash(mut self, hash: impl Into<String>) -> Self {
        self.info_hash = Some(hash.into());
        self
    }

    pub fn with_upgrade(mut self, is_upgrade: bool) -> Self {
        self.is_upgrade = is_upgrade;
        self
    }

    /// Apply a status transition. Illegal transitions are ignored and
    /// reported as `false` so pollers can't corrupt the lifecycle.
    pub fn transition(&mut self, next: QueueStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        if matches!(next, QueueStatus::Completed) && self.completed_at.is_none() {
            self.completed_at = Some(self.updated_at);
            self.progress = 1.0;
        }
        true
    }

    /// Update live stats reported by the download client
    pub fn update_stats(
        &mut self,
        progress: f64,
        download_speed: u64,
        upload_speed: u64,
        eta_seconds: Option<i64>,
        ratio: f64,
    ) {
        self.progress = progress.clamp(0.0, 1.0);
        self.download_speed = download_speed;
        self.upload_speed = upload_speed;
        self.eta_seconds = eta_seconds;
        self.ratio = ratio;
        self.updated_at = Utc::now();
    }

    pub fn record_import_failure(&mut self, message: impl Into<String>) {
        self.import_attempts += 1;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn import_attempts_exhausted(&self) -> bool {
        self.import_attempts >= MAX_IMPORT_ATTEMPTS
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.transition(QueueStatus::Failed);
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
