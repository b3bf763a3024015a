//! Monitoring and task-run history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The periodically-run units of monitoring work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    MissingContent,
    Upgrade,
    CutoffUnmet,
    NewEpisode,
    PendingRelease,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::MissingContent => write!(f, "missing_content"),
            TaskType::Upgrade => write!(f, "upgrade"),
            TaskType::CutoffUnmet => write!(f, "cutoff_unmet"),
            TaskType::NewEpisode => write!(f, "new_episode"),
            TaskType::PendingRelease => write!(f, "pending_release"),
        }
    }
}

/// Outcome recorded for a single item in a task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Grabbed,
    Found,
    NoResults,
    Error,
}

/// Append-only audit record, one per item per task run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringHistory {
    pub id: Uuid,
    pub task_history_id: Uuid,
    pub task_type: TaskType,
    pub movie_id: Option<Uuid>,
    pub episode_id: Option<Uuid>,
    pub status: HistoryStatus,
    pub releases_found: u32,
    pub release_grabbed: Option<String>,
    pub queue_item_id: Option<Uuid>,
    pub is_upgrade: bool,
    pub old_score: Option<i32>,
    pub new_score: Option<i32>,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl MonitoringHistory {
    pub fn new(task_history_id: Uuid, task_type: TaskType, status: HistoryStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_history_id,
            task_type,
            movie_id: None,
            episode_id: None,
            status,
            releases_found: 0,
            release_grabbed: None,
            queue_item_id: None,
            is_upgrade: false,
            old_score: None,
            new_score: None,
            error_message: None,
            executed_at: Utc::now(),
        }
    }

    pub fn for_movie(mut self, movie_id: Uuid) -> Self {
        self.movie_id = Some(movie_id);
        self
    }

    pub fn for_episode(mut self, episode_id: Uuid) -> Self {
        self.episode_id = Some(episode_id);
        self
    }

    pub fn with_releases_found(mut self, count: u32) -> Self {
        self.releases_found = count;
        self
    }

    pub fn with_grab(mut self, title: impl Into<String>, queue_item_id: Uuid) -> Self {
        self.release_grabbed = Some(title.into());
        self.queue_item_id = Some(queue_item_id);
        self
    }

    pub fn with_scores(mut self, old: Option<i32>, new: Option<i32>) -> Self {
        self.old_score = old;
        self.new_score = new;
        self
    }

    pub fn with_upgrade(mut self, is_upgrade: bool) -> Self {
        self.is_upgrade = is_upgrade;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Status of a whole task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunStatus {
    Running,
    Completed,
    Error,
}

/// One row per task run with summary counts.
///
/// Per-item `MonitoringHistory` rows are committed before the run is marked
/// complete, so a finished summary always has its detail rows in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistory {
    pub id: Uuid,
    pub task_type: TaskType,
    pub status: TaskRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items_considered: u32,
    pub items_grabbed: u32,
    pub items_errored: u32,
    pub message: Option<String>,
}

impl TaskHistory {
    pub fn start(task_type: TaskType) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            status: TaskRunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            items_considered: 0,
            items_grabbed: 0,
            items_errored: 0,
            message: None,
        }
    }

    pub fn finish(&mut self, considered: u32, grabbed: u32, errored: u32) {
        self.items_considered = considered;
        self.items_grabbed = grabbed;
        self.items_errored = errored;
        self.status = TaskRunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = TaskRunStatus::Error;
        self.message = Some(message.into());
        self.finished_at = Some(Utc::now());
    }
}
