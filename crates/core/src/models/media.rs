//! Library item models: movies, series, seasons, episodes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A media file already in the library, with the score it earned under the
/// profile that was active when it was imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: Uuid,
    /// Original scene name the file was imported from
    pub scene_name: String,
    pub size_bytes: i64,
    /// Score under the last-used profile; recomputed on demand when the
    /// profile changes
    pub score: Option<i32>,
    pub added_at: DateTime<Utc>,
}

impl MediaFile {
    pub fn new(scene_name: impl Into<String>, size_bytes: i64, score: Option<i32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scene_name: scene_name.into(),
            size_bytes,
            score,
            added_at: Utc::now(),
        }
    }
}

/// Core movie entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub tmdb_id: i32,
    pub imdb_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub profile_id: String,
    pub monitored: bool,
    pub has_file: bool,
    pub existing_file: Option<MediaFile>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    pub fn new(tmdb_id: i32, title: impl Into<String>, profile_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tmdb_id,
            imdb_id: None,
            title: title.into(),
            year: None,
            profile_id: profile_id.into(),
            monitored: true,
            has_file: false,
            existing_file: None,
            added_at: now,
            updated_at: now,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Attach an imported file
    pub fn set_file(&mut self, file: MediaFile) {
        self.has_file = true;
        self.existing_file = Some(file);
        self.updated_at = Utc::now();
    }

    /// Score of the existing file, if any
    pub fn existing_score(&self) -> Option<i32> {
        self.existing_file.as_ref().and_then(|f| f.score)
    }
}

/// A TV series. Seasons and episodes are held by id, not by pointer; walks
/// across the hierarchy go through the library store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: Uuid,
    pub tmdb_id: i32,
    pub title: String,
    pub profile_id: String,
    pub monitored: bool,
    pub added_at: DateTime<Utc>,
}

impl Series {
    pub fn new(tmdb_id: i32, title: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tmdb_id,
            title: title.into(),
            profile_id: profile_id.into(),
            monitored: true,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub series_id: Uuid,
    pub number: i32,
    pub monitored: bool,
}

impl Season {
    pub fn new(series_id: Uuid, number: i32) -> Self {
        Self {
            series_id,
            number,
            monitored: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub series_id: Uuid,
    pub season_number: i32,
    pub number: i32,
    pub absolute_number: Option<i32>,
    pub air_date: Option<DateTime<Utc>>,
    pub monitored: bool,
    pub has_file: bool,
    pub existing_file: Option<MediaFile>,
}

impl Episode {
    pub fn new(series_id: Uuid, season_number: i32, number: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            season_number,
            number,
            absolute_number: None,
            air_date: None,
            monitored: true,
            has_file: false,
            existing_file: None,
        }
    }

    pub fn with_air_date(mut self, air_date: DateTime<Utc>) -> Self {
        self.air_date = Some(air_date);
        self
    }

    /// Cascading monitoring invariant: an episode is monitored iff the
    /// series, its season, and the episode itself are all monitored.
    pub fn is_effectively_monitored(&self, series: &Series, season: &Season) -> bool {
        series.monitored && season.monitored && self.monitored
    }

    pub fn set_file(&mut self, file: MediaFile) {
        self.has_file = true;
        self.existing_file = Some(file);
    }

    pub fn existing_score(&self) -> Option<i32> {
        self.existing_file.as_ref().and_then(|f| f.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascading_monitoring() {
        let mut series = Series::new(100, "Show", "best");
        let mut season = Season::new(series.id, 1);
        let mut episode = Episode::new(series.id, 1, 3);

        assert!(episode.is_effectively_monitored(&series, &season));

        season.monitored = false;
        assert!(!episode.is_effectively_monitored(&series, &season));

        season.monitored = true;
        series.monitored = false;
        assert!(!episode.is_effectively_monitored(&series, &season));

        series.monitored = true;
        episode.monitored = false;
        assert!(!episode.is_effectively_monitored(&series, &season));
    }

    #[test]
    fn movie_file_attachment_updates_state() {
        let mut movie = Movie::new(550, "Fight Club", "best").with_year(1999);
        assert!(!movie.has_file);
        assert_eq!(movie.existing_score(), None);

        movie.set_file(MediaFile::new(
            "Fight.Club.1999.1080p.BluRay.x264-GROUP",
            8_000_000_000,
            Some(1200),
        ));
        assert!(movie.has_file);
        assert_eq!(movie.existing_score(), Some(1200));
    }
}
