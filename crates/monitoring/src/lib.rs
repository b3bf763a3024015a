//! Monitoring scheduler, download lifecycle and the grab pipeline
//!
//! The orchestration layer: periodic tasks walk the library, run candidates
//! through the decision pipeline, and hand winners to the grab service; the
//! download lifecycle polls the clients and drives completed downloads
//! through import or onto the blocklist.

pub mod grab;
pub mod lifecycle;
pub mod scheduler;
pub mod tasks;

pub use grab::{GrabConfig, GrabOutcome, GrabService};
pub use lifecycle::{DownloadLifecycle, DownloadLifecycleService, LifecycleConfig};
pub use scheduler::MonitoringScheduler;
pub use tasks::{
    MissingContentTask, MonitoringTask, NewEpisodeTask, PendingReleaseTask, TaskDeps,
    TaskSummary, UpgradeTask,
};
