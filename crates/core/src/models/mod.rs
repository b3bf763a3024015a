//! Domain models
//!
//! Entities and value objects shared across the decision, indexer and
//! monitoring crates.

pub mod blocklist;
pub mod cooldown;
pub mod delay;
pub mod history;
pub mod media;
pub mod pending;
pub mod queue;
pub mod release;
pub mod settings;

pub use blocklist::{BlockReason, BlocklistEntry};
pub use cooldown::SearchCooldown;
pub use delay::DelayProfile;
pub use history::{
    HistoryStatus, MonitoringHistory, TaskHistory, TaskRunStatus, TaskType,
};
pub use media::{Episode, MediaFile, Movie, Season, Series};
pub use pending::{PendingRelease, PendingStatus, MAX_PENDING_AGE_HOURS};
pub use queue::{QueueItem, QueueStatus, MAX_IMPORT_ATTEMPTS};
pub use release::{ContentRef, Protocol, Release};
pub use settings::MonitoringSettings;
