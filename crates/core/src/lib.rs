//! Core domain models and business logic for Cinephage
//!
//! This crate contains the fundamental domain models, repository traits,
//! collaborator interfaces and the worker/background-service framework
//! that the rest of the system is built on.

pub mod domain;
pub mod error;
pub mod models;
pub mod retry;
pub mod store;
pub mod workers;

// Re-export core types
pub use domain::*;
pub use error::*;
pub use models::*;
pub use retry::{retry_with_backoff, RetryConfig, RetryPolicy};
pub use store::MemoryStore;
pub use workers::{
    BackgroundService, ServiceManager, ServiceStatus, StatusCell, Worker, WorkerContext,
    WorkerManager, WorkerManagerConfig, WorkerRecord, WorkerStatus,
};
