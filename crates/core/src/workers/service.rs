//! Background-service lifecycle

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Pending,
    Starting,
    Ready,
    Error,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Pending => write!(f, "pending"),
            ServiceStatus::Starting => write!(f, "starting"),
            ServiceStatus::Ready => write!(f, "ready"),
            ServiceStatus::Error => write!(f, "error"),
        }
    }
}

/// Shared status cell for service implementations
#[derive(Debug, Default)]
pub struct StatusCell(Mutex<ServiceStatus>);

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ServiceStatus {
        *self.0.lock().unwrap()
    }

    pub fn set(&self, status: ServiceStatus) {
        *self.0.lock().unwrap() = status;
    }
}

/// A process-wide singleton with a non-blocking start and an async stop.
///
/// `start` must return immediately; actual initialization happens on a
/// spawned task. `stop` releases all resources and cancels owned workers.
#[async_trait]
pub trait BackgroundService: Send + Sync {
    fn name(&self) -> &str;

    fn status(&self) -> ServiceStatus;

    fn start(&self, shutdown: CancellationToken) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Composes services in declared dependency order: started front-to-back,
/// stopped back-to-front.
pub struct ServiceManager {
    services: Vec<Arc<dyn BackgroundService>>,
    shutdown: CancellationToken,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn register(&mut self, service: Arc<dyn BackgroundService>) {
        self.services.push(service);
    }

    /// Token cancelled on shutdown; services derive child tokens from it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn start_all(&self) -> Result<()> {
        for service in &self.services {
            info!(service = service.name(), "starting service");
            service.start(self.shutdown.child_token())?;
        }
        Ok(())
    }

    pub async fn stop_all(&self) {
        self.shutdown.cancel();
        for service in self.services.iter().rev() {
            info!(service = service.name(), "stopping service");
            if let Err(err) = service.stop().await {
                error!(service = service.name(), error = %err, "service stop failed");
            }
        }
    }

    pub fn statuses(&self) -> Vec<(String, ServiceStatus)> {
        self.services
            .iter()
            .map(|s| (s.name().to_string(), s.status()))
            .collect()
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}
