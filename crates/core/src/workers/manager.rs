//! Worker manager: spawn caps, introspection, garbage collection

use super::worker::{Worker, WorkerContext, WorkerRecord, WorkerState, WorkerStatus};
use crate::error::{CinephageError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the worker manager
#[derive(Debug, Clone)]
pub struct WorkerManagerConfig {
    /// Maximum concurrently active workers per worker type
    pub max_concurrent_per_type: usize,
    /// How long terminal workers are retained for introspection
    pub retention: Duration,
    /// How often the GC sweep runs
    pub gc_interval: std::time::Duration,
}

impl Default for WorkerManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_type: 4,
            retention: Duration::hours(1),
            gc_interval: std::time::Duration::from_secs(60),
        }
    }
}

struct WorkerEntry {
    worker_type: String,
    state: Arc<WorkerState>,
    token: CancellationToken,
    created_at: DateTime<Utc>,
}

/// Tracks active workers, enforces per-type concurrency caps and drops
/// terminal workers after a retention window.
pub struct WorkerManager {
    config: WorkerManagerConfig,
    workers: Arc<RwLock<HashMap<Uuid, WorkerEntry>>>,
    root: CancellationToken,
}

impl WorkerManager {
    pub fn new(config: WorkerManagerConfig) -> Self {
        Self {
            config,
            workers: Arc::new(RwLock::new(HashMap::new())),
            root: CancellationToken::new(),
        }
    }

    /// Spawn a worker in the background (fire-and-forget). Rejects the
    /// spawn when the per-type concurrency cap is already reached.
    pub async fn spawn_background(&self, worker: Arc<dyn Worker>) -> Result<Uuid> {
        let worker_type = worker.worker_type().to_string();

        let id = {
            let mut workers = self.workers.write().await;
            let active = workers
                .values()
                .filter(|w| w.worker_type == worker_type && !w.state.status().is_terminal())
                .count();
            if active >= self.config.max_concurrent_per_type {
                return Err(CinephageError::ValidationError {
                    field: "worker".to_string(),
                    message: format!(
                        "concurrency cap reached for worker type '{}' ({} active)",
                        worker_type, active
                    ),
                });
            }

            let id = Uuid::new_v4();
            let state = Arc::new(WorkerState::new(serde_json::json!({})));
            let token = self.root.child_token();
            workers.insert(
                id,
                WorkerEntry {
                    worker_type: worker_type.clone(),
                    state: state.clone(),
                    token: token.clone(),
                    created_at: Utc::now(),
                },
            );

            let ctx = WorkerContext::new(id, worker_type.clone(), token.clone(), state.clone());
            tokio::spawn(async move {
                state.mark_running();
                debug!(worker_id = %id, worker_type = %ctx.worker_type(), "worker started");

                let result = tokio::select! {
                    _ = token.cancelled() => Err(CinephageError::Cancelled {
                        operation: ctx.worker_type().to_string(),
                    }),
                    r = worker.execute(&ctx) => r,
                };

                match result {
                    Ok(()) if token.is_cancelled() => {
                        state.finish(WorkerStatus::Cancelled, None);
                        info!(worker_id = %id, "worker cancelled");
                    }
                    Ok(()) => {
                        state.finish(WorkerStatus::Completed, None);
                        debug!(worker_id = %id, "worker completed");
                    }
                    Err(CinephageError::Cancelled { .. }) => {
                        state.finish(WorkerStatus::Cancelled, None);
                        info!(worker_id = %id, "worker cancelled");
                    }
                    Err(err) => {
                        warn!(worker_id = %id, error = %err, "worker failed");
                        state.finish(WorkerStatus::Failed, Some(err.to_string()));
                    }
                }
            });

            id
        };

        Ok(id)
    }

    /// Request cancellation of a worker. Returns `false` for unknown or
    /// already-terminal workers.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let workers = self.workers.read().await;
        match workers.get(&id) {
            Some(entry) if !entry.state.status().is_terminal() => {
                entry.token.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<WorkerRecord> {
        let workers = self.workers.read().await;
        workers
            .get(&id)
            .map(|entry| entry.state.snapshot(id, &entry.worker_type))
    }

    pub async fn list(&self) -> Vec<WorkerRecord> {
        let workers = self.workers.read().await;
        workers
            .iter()
            .map(|(id, entry)| entry.state.snapshot(*id, &entry.worker_type))
            .collect()
    }

    /// Drop terminal workers whose completion is older than the retention
    /// window; returns the number removed.
    pub async fn gc(&self) -> usize {
        let cutoff = Utc::now() - self.config.retention;
        let mut workers = self.workers.write().await;
        let before = workers.len();
        workers.retain(|_, entry| {
            if !entry.state.status().is_terminal() {
                return true;
            }
            match entry.state.completed_at() {
                Some(completed) => completed > cutoff,
                None => entry.created_at > cutoff,
            }
        });
        let removed = before - workers.len();
        if removed > 0 {
            debug!(removed, "collected terminal workers");
        }
        removed
    }

    /// Periodic GC loop; exits when the manager shuts down
    pub async fn run_gc_loop(&self) {
        let mut interval = tokio::time::interval(self.config.gc_interval);
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                _ = interval.tick() => {
                    self.gc().await;
                }
            }
        }
    }

    /// Cancel every worker and stop the GC loop
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}
