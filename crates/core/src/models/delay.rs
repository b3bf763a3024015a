//! Delay profiles for the pending-release queue

use super::release::Protocol;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Controls how long a grabbed release waits before being dispatched,
/// giving better releases a window to show up first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayProfile {
    pub id: Uuid,
    pub enabled: bool,
    pub usenet_delay_minutes: i64,
    pub torrent_delay_minutes: i64,
    /// Extra delay per parsed resolution label ("2160p", "1080p", ...)
    pub quality_delays: HashMap<String, i64>,
    /// Releases on the preferred protocol skip the protocol delay
    pub preferred_protocol: Option<Protocol>,
    /// Dispatch immediately when the candidate already meets the profile cutoff
    pub bypass_if_highest_quality: bool,
    /// Dispatch immediately when the candidate score is at or above this
    pub bypass_if_above_score: Option<i32>,
    pub sort_order: i32,
}

impl DelayProfile {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            enabled: true,
            usenet_delay_minutes: 0,
            torrent_delay_minutes: 0,
            quality_delays: HashMap::new(),
            preferred_protocol: None,
            bypass_if_highest_quality: true,
            bypass_if_above_score: None,
            sort_order: 0,
        }
    }

    pub fn with_torrent_delay(mut self, minutes: i64) -> Self {
        self.torrent_delay_minutes = minutes;
        self
    }

    pub fn with_usenet_delay(mut self, minutes: i64) -> Self {
        self.usenet_delay_minutes = minutes;
        self
    }

    pub fn with_quality_delay(mut self, resolution: impl Into<String>, minutes: i64) -> Self {
        self.quality_delays.insert(resolution.into(), minutes);
        self
    }

    /// Effective delay for a release: the longer of the protocol delay and
    /// the per-resolution delay. The preferred protocol skips its protocol
    /// delay (quality delays still apply).
    pub fn delay_for(&self, protocol: Protocol, resolution: &str) -> Duration {
        if !self.enabled {
            return Duration::zero();
        }

        let protocol_minutes = if self.preferred_protocol == Some(protocol) {
            0
        } else {
            match protocol {
                Protocol::Torrent => self.torrent_delay_minutes,
                Protocol::Usenet => self.usenet_delay_minutes,
                Protocol::Streaming => 0,
            }
        };

        let quality_minutes = self.quality_delays.get(resolution).copied().unwrap_or(0);

        Duration::minutes(protocol_minutes.max(quality_minutes))
    }
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_of_protocol_and_quality_delay_wins() {
        let profile = DelayProfile::new()
            .with_torrent_delay(60)
            .with_quality_delay("2160p", 120);

        assert_eq!(
            profile.delay_for(Protocol::Torrent, "1080p"),
            Duration::minutes(60)
        );
        assert_eq!(
            profile.delay_for(Protocol::Torrent, "2160p"),
            Duration::minutes(120)
        );
    }

    #[test]
    fn preferred_protocol_skips_protocol_delay() {
        let mut profile = DelayProfile::new().with_torrent_delay(60).with_usenet_delay(30);
        profile.preferred_protocol = Some(Protocol::Torrent);

        assert_eq!(
            profile.delay_for(Protocol::Torrent, "1080p"),
            Duration::zero()
        );
        assert_eq!(
            profile.delay_for(Protocol::Usenet, "1080p"),
            Duration::minutes(30)
        );
    }

    #[test]
    fn disabled_profile_never_delays() {
        let mut profile = DelayProfile::new().with_torrent_delay(60);
        profile.enabled = false;
        assert_eq!(
            profile.delay_for(Protocol::Torrent, "1080p"),
            Duration::zero()
        );
    }
}
