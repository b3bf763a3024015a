//! Worker and background-service framework
//!
//! A uniform, cancellable unit of long-running work with progress, a
//! bounded log buffer and introspection, plus the process-wide service
//! lifecycle that hosts the schedulers and pollers.

pub mod manager;
pub mod service;
pub mod worker;

pub use manager::{WorkerManager, WorkerManagerConfig};
pub use service::{BackgroundService, ServiceManager, ServiceStatus, StatusCell};
pub use worker::{Worker, WorkerContext, WorkerRecord, WorkerStatus};
