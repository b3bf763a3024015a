//! Cancellable worker abstraction

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lines kept in a worker's ring-buffered log
pub const LOG_BUFFER_LINES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerStatus::Completed | WorkerStatus::Failed | WorkerStatus::Cancelled
        )
    }
}

#[derive(Debug)]
struct StateInner {
    status: WorkerStatus,
    progress: u8,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
    logs: VecDeque<String>,
}

/// Shared mutable worker state. Updates are quick and never hold the lock
/// across an await.
#[derive(Debug)]
pub(crate) struct WorkerState {
    inner: Mutex<StateInner>,
}

impl WorkerState {
    pub(crate) fn new(metadata: serde_json::Value) -> Self {
        Self {
            inner: Mutex::new(StateInner {
                status: WorkerStatus::Pending,
                progress: 0,
                metadata,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                error: None,
                logs: VecDeque::with_capacity(LOG_BUFFER_LINES),
            }),
        }
    }

    pub(crate) fn mark_running(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.status = WorkerStatus::Running;
        inner.started_at = Some(Utc::now());
    }

    pub(crate) fn finish(&self, status: WorkerStatus, error: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.status.is_terminal() {
            return;
        }
        inner.status = status;
        inner.error = error;
        inner.completed_at = Some(Utc::now());
        if status == WorkerStatus::Completed {
            inner.progress = 100;
        }
    }

    fn set_progress(&self, progress: u8) {
        let mut inner = self.inner.lock().unwrap();
        inner.progress = progress.min(100);
    }

    fn push_log(&self, line: String) {
        let mut inner = self.inner.lock().unwrap();
        if inner.logs.len() == LOG_BUFFER_LINES {
            inner.logs.pop_front();
        }
        inner.logs.push_back(line);
    }

    pub(crate) fn snapshot(&self, id: Uuid, worker_type: &str) -> WorkerRecord {
        let inner = self.inner.lock().unwrap();
        WorkerRecord {
            id,
            worker_type: worker_type.to_string(),
            status: inner.status,
            progress: inner.progress,
            metadata: inner.metadata.clone(),
            created_at: inner.created_at,
            started_at: inner.started_at,
            completed_at: inner.completed_at,
            error: inner.error.clone(),
            recent_logs: inner.logs.iter().cloned().collect(),
        }
    }

    pub(crate) fn status(&self) -> WorkerStatus {
        self.inner.lock().unwrap().status
    }

    pub(crate) fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().completed_at
    }
}

/// Handle a worker uses to report progress and observe cancellation
#[derive(Clone)]
pub struct WorkerContext {
    id: Uuid,
    worker_type: String,
    cancellation: CancellationToken,
    state: Arc<WorkerState>,
}

impl WorkerContext {
    pub(crate) fn new(
        id: Uuid,
        worker_type: String,
        cancellation: CancellationToken,
        state: Arc<WorkerState>,
    ) -> Self {
        Self {
            id,
            worker_type,
            cancellation,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn worker_type(&self) -> &str {
        &self.worker_type
    }

    /// Workers must check this periodically and exit promptly when set
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn set_progress(&self, progress: u8) {
        self.state.set_progress(progress);
    }

    pub fn log(&self, line: impl Into<String>) {
        self.state.push_log(line.into());
    }
}

/// A unit of long-running work. The framework wraps `execute` with state
/// transitions and error capture.
#[async_trait]
pub trait Worker: Send + Sync {
    fn worker_type(&self) -> &str;

    async fn execute(&self, ctx: &WorkerContext) -> Result<()>;
}

/// Introspection snapshot of a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: Uuid,
    pub worker_type: String,
    pub status: WorkerStatus,
    pub progress: u8,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub recent_logs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_buffer_is_bounded() {
        let state = WorkerState::new(serde_json::json!({}));
        for i in 0..(LOG_BUFFER_LINES + 10) {
            state.push_log(format!("line {}", i));
        }
        let record = state.snapshot(Uuid::new_v4(), "test");
        assert_eq!(record.recent_logs.len(), LOG_BUFFER_LINES);
        assert_eq!(record.recent_logs[0], "line 10");
    }

    #[test]
    fn finish_is_idempotent_once_terminal() {
        let state = WorkerState::new(serde_json::json!({}));
        state.mark_running();
        state.finish(WorkerStatus::Cancelled, None);
        state.finish(WorkerStatus::Completed, None);
        assert_eq!(state.status(), WorkerStatus::Cancelled);
    }
}
