//! Monitoring scheduler
//!
//! Interval-driven loop per task: each task fires once shortly after
//! start (staggered so the indexers aren't hit in one burst), then on its
//! configured period. Intervals are re-read from settings every tick, so
//! edits take effect within one tick. A task still running when its next
//! tick arrives is skipped, not queued.

use crate::tasks::MonitoringTask;
use async_trait::async_trait;
use cinephage_core::{
    BackgroundService, CinephageError, HistoryRepository, Result, ServiceStatus,
    SettingsRepository, StatusCell, TaskHistory, TaskType, Worker, WorkerContext, WorkerManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct MonitoringScheduler {
    settings: Arc<dyn SettingsRepository>,
    history: Arc<dyn HistoryRepository>,
    tasks: Vec<Arc<dyn MonitoringTask>>,
    stagger: Duration,
    status: StatusCell,
}

impl MonitoringScheduler {
    pub fn new(
        settings: Arc<dyn SettingsRepository>,
        history: Arc<dyn HistoryRepository>,
        tasks: Vec<Arc<dyn MonitoringTask>>,
    ) -> Self {
        Self {
            settings,
            history,
            tasks,
            stagger: Duration::from_secs(2),
            status: StatusCell::new(),
        }
    }

    /// Seconds between task start-ups on boot
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// One full task run with its history bracket. Item rows are committed
    /// by the task before the summary is finished.
    pub async fn run_task(
        task: &dyn MonitoringTask,
        history: &dyn HistoryRepository,
        token: &CancellationToken,
    ) {
        let mut run = TaskHistory::start(task.kind());
        if let Err(err) = history.start_task_run(&run).await {
            error!(task = %task.kind(), error = %err, "failed to open task history");
            return;
        }
        info!(task = %task.kind(), run_id = %run.id, "task starting");

        match task.run(run.id, token).await {
            Ok(summary) => {
                info!(
                    task = %task.kind(),
                    considered = summary.considered,
                    grabbed = summary.grabbed,
                    errored = summary.errored,
                    "task finished"
                );
                run.finish(summary.considered, summary.grabbed, summary.errored);
            }
            Err(err) => {
                error!(task = %task.kind(), error = %err, "task failed");
                run.fail(err.to_string());
            }
        }

        if let Err(err) = history.finish_task_run(&run).await {
            error!(task = %task.kind(), error = %err, "failed to close task history");
        }
    }

    /// Run a task now, outside its schedule, hosted on the worker framework
    /// so user-triggered runs show up in introspection and respect the
    /// per-type concurrency cap.
    pub async fn trigger_now(&self, workers: &WorkerManager, kind: TaskType) -> Result<Uuid> {
        let task = self
            .tasks
            .iter()
            .find(|task| task.kind() == kind)
            .cloned()
            .ok_or_else(|| CinephageError::NotFound {
                resource: format!("task {}", kind),
            })?;

        workers
            .spawn_background(Arc::new(TaskWorker {
                task,
                history: self.history.clone(),
            }))
            .await
    }
}

/// Adapter hosting one task run on the worker framework
struct TaskWorker {
    task: Arc<dyn MonitoringTask>,
    history: Arc<dyn HistoryRepository>,
}

#[async_trait]
impl Worker for TaskWorker {
    fn worker_type(&self) -> &str {
        "monitoring-task"
    }

    async fn execute(&self, ctx: &WorkerContext) -> Result<()> {
        ctx.log(format!("running {} on demand", self.task.kind()));
        MonitoringScheduler::run_task(
            self.task.as_ref(),
            self.history.as_ref(),
            ctx.cancellation(),
        )
        .await;
        ctx.set_progress(100);
        Ok(())
    }
}

#[async_trait]
impl BackgroundService for MonitoringScheduler {
    fn name(&self) -> &str {
        "monitoring-scheduler"
    }

    fn status(&self) -> ServiceStatus {
        self.status.get()
    }

    fn start(&self, shutdown: CancellationToken) -> Result<()> {
        self.status.set(ServiceStatus::Starting);

        for (index, task) in self.tasks.iter().enumerate() {
            let task = task.clone();
            let settings = self.settings.clone();
            let history = self.history.clone();
            let token = shutdown.child_token();
            let initial_delay = self.stagger * (index as u32 + 1);
            // re-entrancy guard: a tick that arrives while the task runs is
            // skipped
            let guard = Arc::new(tokio::sync::Mutex::new(()));

            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(initial_delay) => {}
                }

                loop {
                    match guard.try_lock() {
                        Ok(_running) => {
                            MonitoringScheduler::run_task(task.as_ref(), history.as_ref(), &token)
                                .await;
                        }
                        Err(_) => {
                            warn!(task = %task.kind(), "previous run still active, skipping tick");
                        }
                    }

                    // interval re-read each tick so settings edits land
                    let interval = match settings.monitoring().await {
                        Ok(settings) => settings
                            .interval_for(task.kind())
                            .to_std()
                            .unwrap_or(Duration::from_secs(3600)),
                        Err(err) => {
                            error!(task = %task.kind(), error = %err, "failed to load settings");
                            Duration::from_secs(60)
                        }
                    };

                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            });
        }

        self.status.set(ServiceStatus::Ready);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        // task loops exit via the shutdown token
        self.status.set(ServiceStatus::Pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskSummary;
    use cinephage_core::{MemoryStore, TaskRunStatus, TaskType};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct CountingTask {
        kind: TaskType,
        runs: AtomicU32,
        delay: Duration,
    }

    #[async_trait]
    impl MonitoringTask for CountingTask {
        fn kind(&self) -> TaskType {
            self.kind
        }

        async fn run(&self, _run_id: Uuid, _token: &CancellationToken) -> Result<TaskSummary> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(TaskSummary {
                considered: 3,
                grabbed: 1,
                errored: 0,
            })
        }
    }

    #[tokio::test]
    async fn tasks_fire_once_on_start_and_write_history() {
        let store = Arc::new(MemoryStore::new());
        let task = Arc::new(CountingTask {
            kind: TaskType::MissingContent,
            runs: AtomicU32::new(0),
            delay: Duration::ZERO,
        });

        let scheduler = MonitoringScheduler::new(store.clone(), store.clone(), vec![task.clone()])
            .with_stagger(Duration::from_millis(5));
        let shutdown = CancellationToken::new();
        scheduler.start(shutdown.child_token()).unwrap();
        assert_eq!(scheduler.status(), ServiceStatus::Ready);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        // fired exactly once: the configured interval is 24h
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);

        let runs = store.recent_runs(TaskType::MissingContent, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, TaskRunStatus::Completed);
        assert_eq!(runs[0].items_considered, 3);
        assert_eq!(runs[0].items_grabbed, 1);
        assert!(runs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn trigger_now_runs_on_the_worker_framework() {
        let store = Arc::new(MemoryStore::new());
        let task = Arc::new(CountingTask {
            kind: TaskType::MissingContent,
            runs: AtomicU32::new(0),
            delay: Duration::ZERO,
        });
        let scheduler =
            MonitoringScheduler::new(store.clone(), store.clone(), vec![task.clone()]);
        let workers = WorkerManager::new(cinephage_core::WorkerManagerConfig::default());

        let worker_id = scheduler
            .trigger_now(&workers, TaskType::MissingContent)
            .await
            .unwrap();

        for _ in 0..100 {
            if let Some(record) = workers.get(worker_id).await {
                if record.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        let record = workers.get(worker_id).await.unwrap();
        assert_eq!(record.status, cinephage_core::WorkerStatus::Completed);
        assert!(!store
            .recent_runs(TaskType::MissingContent, 10)
            .await
            .unwrap()
            .is_empty());

        // unknown task kinds are rejected
        assert!(scheduler
            .trigger_now(&workers, TaskType::NewEpisode)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn failing_task_marks_run_errored() {
        struct FailingTask;

        #[async_trait]
        impl MonitoringTask for FailingTask {
            fn kind(&self) -> TaskType {
                TaskType::Upgrade
            }

            async fn run(&self, _run_id: Uuid, _token: &CancellationToken) -> Result<TaskSummary> {
                Err(cinephage_core::CinephageError::ConfigurationError {
                    field: "profile".to_string(),
                    message: "referenced profile missing".to_string(),
                })
            }
        }

        let store = Arc::new(MemoryStore::new());
        let token = CancellationToken::new();
        MonitoringScheduler::run_task(&FailingTask, store.as_ref(), &token).await;

        let runs = store.recent_runs(TaskType::Upgrade, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, TaskRunStatus::Error);
        assert!(runs[0].message.is_some());
    }
}
