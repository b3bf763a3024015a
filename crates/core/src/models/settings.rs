//! Monitoring settings

use super::history::TaskType;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Scheduler configuration. Monitoring runs whenever the service is up;
/// there is no master toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub missing_interval_hours: i64,
    pub upgrade_interval_hours: i64,
    pub cutoff_unmet_interval_hours: i64,
    /// Doubles as the new-episode air-date window, so each airing is
    /// observed by exactly one tick.
    pub new_episode_interval_hours: i64,
    pub pending_interval_minutes: i64,
    /// Items processed per task run, to bound indexer load
    pub batch_cap: usize,
    /// Fraction of the task interval used as the per-item search cooldown
    pub cooldown_factor: f64,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            missing_interval_hours: 24,
            upgrade_interval_hours: 168,
            cutoff_unmet_interval_hours: 24,
            new_episode_interval_hours: 1,
            pending_interval_minutes: 5,
            batch_cap: 50,
            cooldown_factor: 0.75,
        }
    }
}

impl MonitoringSettings {
    pub fn interval_for(&self, task: TaskType) -> Duration {
        match task {
            TaskType::MissingContent => Duration::hours(self.missing_interval_hours),
            TaskType::Upgrade => Duration::hours(self.upgrade_interval_hours),
            TaskType::CutoffUnmet => Duration::hours(self.cutoff_unmet_interval_hours),
            TaskType::NewEpisode => Duration::hours(self.new_episode_interval_hours),
            TaskType::PendingRelease => Duration::minutes(self.pending_interval_minutes),
        }
    }

    /// Per-item cooldown after a search: `interval * cooldown_factor`
    pub fn cooldown_for(&self, task: TaskType) -> Duration {
        let interval = self.interval_for(task);
        let millis = (interval.num_milliseconds() as f64 * self.cooldown_factor) as i64;
        Duration::milliseconds(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_is_three_quarters_of_interval() {
        let settings = MonitoringSettings::default();
        assert_eq!(
            settings.cooldown_for(TaskType::MissingContent),
            Duration::hours(18)
        );
        assert_eq!(
            settings.cooldown_for(TaskType::NewEpisode),
            Duration::minutes(45)
        );
    }
}
