//! Per-item search cooldowns

use super::history::TaskType;
use super::release::ContentRef;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Prevents thrashing indexers by searching the same item back-to-back.
///
/// Keyed by (content, task type); the scheduler sets `next_search_at` to
/// `now + interval * 0.75` after each search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCooldown {
    pub content: ContentRef,
    pub task_type: TaskType,
    pub last_searched_at: DateTime<Utc>,
    pub next_search_at: DateTime<Utc>,
}

impl SearchCooldown {
    pub fn record(content: ContentRef, task_type: TaskType, cooldown: Duration) -> Self {
        let now = Utc::now();
        Self {
            content,
            task_type,
            last_searched_at: now,
            next_search_at: now + cooldown,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.next_search_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn cooldown_expires() {
        let cooldown = SearchCooldown::record(
            ContentRef::movie(Uuid::new_v4()),
            TaskType::MissingContent,
            Duration::hours(18),
        );

        assert!(cooldown.is_active(Utc::now()));
        assert!(!cooldown.is_active(Utc::now() + Duration::hours(19)));
    }
}
