//! Core error types for the Cinephage domain

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of an indexer failure.
///
/// Drives the orchestrator's handling: network/rate-limit failures are
/// retried, auth/captcha/cloudflare failures put the indexer in cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerErrorKind {
    Network,
    Auth,
    Captcha,
    Cloudflare,
    RateLimit,
    Parse,
    Internal,
}

impl std::fmt::Display for IndexerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IndexerErrorKind::Network => "network",
            IndexerErrorKind::Auth => "auth",
            IndexerErrorKind::Captcha => "captcha",
            IndexerErrorKind::Cloudflare => "cloudflare",
            IndexerErrorKind::RateLimit => "ratelimit",
            IndexerErrorKind::Parse => "parse",
            IndexerErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum CinephageError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("Configuration error: {field} - {message}")]
    ConfigurationError { field: String, message: String },

    #[error("Indexer {indexer} failed ({kind}): {message}")]
    IndexerError {
        indexer: String,
        kind: IndexerErrorKind,
        message: String,
    },

    #[error("Download client {client} error: {message}")]
    DownloadClientError { client: String, message: String },

    #[error("External service error: {service} - {error}")]
    ExternalServiceError { service: String, error: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: Box<CinephageError>,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

pub type Result<T> = std::result::Result<T, CinephageError>;

impl CinephageError {
    /// Transient failures are safe to retry with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            CinephageError::Timeout { .. }
            | CinephageError::DatabaseError { .. }
            | CinephageError::ExternalServiceError { .. } => true,
            CinephageError::IndexerError { kind, .. } => matches!(
                kind,
                IndexerErrorKind::Network | IndexerErrorKind::RateLimit
            ),
            CinephageError::DownloadClientError { .. } => true,
            _ => false,
        }
    }

    /// Protocol failures are never retried; the indexer enters cooldown instead.
    pub fn is_protocol_failure(&self) -> bool {
        matches!(
            self,
            CinephageError::IndexerError {
                kind: IndexerErrorKind::Auth
                    | IndexerErrorKind::Captcha
                    | IndexerErrorKind::Cloudflare,
                ..
            }
        )
    }
}
