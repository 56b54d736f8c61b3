//! Health checks
//!
//! `/health` only proves the process answers. `/health/ready` checks that
//! the attachment directory is usable and thumbnail specs are configured.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            _ => Self::Healthy,
        }
    }
}

/// Individual component health
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        if self.status.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub struct HealthChecker {
    start_time: Instant,
    storage_root: Option<PathBuf>,
    spec_count: usize,
}

impl HealthChecker {
    pub fn new(spec_count: usize) -> Self {
        Self {
            start_time: Instant::now(),
            storage_root: None,
            spec_count,
        }
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    pub async fn check(&self) -> HealthReport {
        let mut components = Vec::new();
        if let Some(root) = &self.storage_root {
            components.push(check_storage(root).await);
        }
        components.push(self.check_thumbnails());

        let status = components
            .iter()
            .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
            timestamp: chrono::Utc::now(),
        }
    }

    fn check_thumbnails(&self) -> ComponentHealth {
        let (status, message) = if self.spec_count == 0 {
            (HealthStatus::Degraded, "No thumbnail specs configured".to_string())
        } else {
            (HealthStatus::Healthy, format!("{} specs", self.spec_count))
        };
        ComponentHealth {
            name: "thumbnails".to_string(),
            status,
            message: Some(message),
        }
    }
}

async fn check_storage(root: &Path) -> ComponentHealth {
    let (status, message) = match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
            (HealthStatus::Healthy, root.display().to_string())
        }
        Ok(_) => (
            HealthStatus::Unhealthy,
            format!("{} is not a writable directory", root.display()),
        ),
        Err(e) => {
            warn!(path = %root.display(), error = %e, "Attachment storage unavailable");
            (HealthStatus::Unhealthy, e.to_string())
        }
    };
    ComponentHealth {
        name: "storage".to_string(),
        status,
        message: Some(message),
    }
}

/// Liveness
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness with the full report
pub async fn readiness(State(health): State<Arc<HealthChecker>>) -> (StatusCode, Json<HealthReport>) {
    let report = health.check().await;
    (report.http_status(), Json(report))
}
