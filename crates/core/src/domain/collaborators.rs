//! External collaborator interfaces
//!
//! The decision core never talks to the network itself; download clients,
//! the import pipeline and the metadata provider are reached through these
//! traits.

use crate::error::Result;
use crate::models::{Movie, QueueItem, Series};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What gets handed to a download client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadPayload {
    Magnet { uri: String },
    TorrentBytes { bytes: Vec<u8> },
    NzbBytes { bytes: Vec<u8> },
    Url { url: String },
}

/// Request to add a download
#[derive(Debug, Clone)]
pub struct AddDownload {
    pub payload: DownloadPayload,
    pub category: Option<String>,
    pub title: String,
}

/// Identifiers returned by the client for a newly added download
#[derive(Debug, Clone)]
pub struct AddedDownload {
    pub download_id: String,
    pub info_hash: Option<String>,
}

/// Client-side status of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientItemStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Failed,
}

/// Live state of one item as reported by the download client
#[derive(Debug, Clone)]
pub struct ClientItem {
    pub download_id: String,
    pub info_hash: Option<String>,
    pub name: String,
    pub status: ClientItemStatus,
    pub progress: f64, // 0.0 to 1.0
    pub size_bytes: i64,
    pub download_speed: u64,
    pub upload_speed: u64,
    pub eta_seconds: Option<i64>,
    pub ratio: f64,
    pub save_path: Option<String>,
    pub error_message: Option<String>,
}

/// A download client adapter (qBittorrent, SABnzbd, ...)
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Stable identifier used to link queue rows to this client
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn add(&self, request: AddDownload) -> Result<AddedDownload>;

    async fn list(&self) -> Result<Vec<ClientItem>>;

    async fn remove(&self, download_id: &str, delete_files: bool) -> Result<()>;

    async fn pause(&self, download_id: &str) -> Result<()>;

    async fn resume(&self, download_id: &str) -> Result<()>;
}

/// Result of handing a completed download to the import pipeline
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub imported: bool,
    pub files: Vec<String>,
    pub error: Option<String>,
}

/// The filesystem import collaborator (naming, hardlink/copy/move)
#[async_trait]
pub trait ImportService: Send + Sync {
    async fn import(&self, item: &QueueItem) -> Result<ImportOutcome>;
}

/// External ids known for a piece of content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalIds {
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i32>,
}

/// TMDB-like metadata provider
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn get_movie(&self, tmdb_id: i32) -> Result<Option<Movie>>;

    async fn get_show(&self, tmdb_id: i32) -> Result<Option<Series>>;

    async fn get_external_ids(&self, media_type: &str, tmdb_id: i32) -> Result<ExternalIds>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedMetadata;

    #[async_trait]
    impl MetadataProvider for CannedMetadata {
        async fn get_movie(&self, tmdb_id: i32) -> Result<Option<Movie>> {
            Ok(Some(Movie::new(tmdb_id, "Canned", "best")))
        }

        async fn get_show(&self, _tmdb_id: i32) -> Result<Option<Series>> {
            Ok(None)
        }

        async fn get_external_ids(&self, _media_type: &str, tmdb_id: i32) -> Result<ExternalIds> {
            Ok(ExternalIds {
                tmdb_id: Some(tmdb_id),
                imdb_id: Some("tt0137523".to_string()),
                tvdb_id: None,
            })
        }
    }

    #[tokio::test]
    async fn metadata_provider_works_as_a_trait_object() {
        let provider: std::sync::Arc<dyn MetadataProvider> = std::sync::Arc::new(CannedMetadata);

        let movie = provider.get_movie(550).await.unwrap().unwrap();
        assert_eq!(movie.tmdb_id, 550);

        let ids = provider.get_external_ids("movie", 550).await.unwrap();
        assert_eq!(ids.imdb_id.as_deref(), Some("tt0137523"));
        assert!(provider.get_show(1399).await.unwrap().is_none());
    }
}
