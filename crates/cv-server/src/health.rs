//! Health Check System
//!
//! Health checks for the two pieces of infrastructure the service leans
//! on: the rendition cache directory and the message spool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

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
}

/// Individual component health
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
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
        match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health checker configuration
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Cache duration for health results
    pub cache_duration: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(10),
        }
    }
}

/// Cached health result
struct CachedHealth {
    report: HealthReport,
    cached_at: Instant,
}

/// Health checker service
pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
    cache: RwLock<Option<CachedHealth>>,
    cache_root: PathBuf,
    spool_root: PathBuf,
}

impl HealthChecker {
    pub fn new(
        config: HealthConfig,
        cache_root: impl AsRef<Path>,
        spool_root: impl AsRef<Path>,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            cache: RwLock::new(None),
            cache_root: cache_root.as_ref().to_path_buf(),
            spool_root: spool_root.as_ref().to_path_buf(),
        }
    }

    /// Get cached health or perform checks
    pub async fn check(&self) -> HealthReport {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.cached_at.elapsed() < self.config.cache_duration {
                    debug!("Returning cached health report");
                    return cached.report.clone();
                }
            }
        }

        let report = self.perform_checks().await;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedHealth {
                report: report.clone(),
                cached_at: Instant::now(),
            });
        }

        report
    }

    async fn perform_checks(&self) -> HealthReport {
        let mut components = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        // The cache dir must be writable; the whole service is down without it.
        let cache_health = self.check_cache_dir().await;
        if cache_health.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        }
        components.push(cache_health);

        // A missing spool degrades the service: cache hits still resolve.
        let spool_health = self.check_spool().await;
        if spool_health.status != HealthStatus::Healthy
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        components.push(spool_health);

        HealthReport {
            status: overall_status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Full write-read-delete probe of the cache directory.
    async fn check_cache_dir(&self) -> ComponentHealth {
        let start = Instant::now();
        let result = Self::probe_writable(&self.cache_root).await;

        let (status, message) = match result {
            Ok(()) => (HealthStatus::Healthy, Some("Writable".to_string())),
            Err(e) => (HealthStatus::Unhealthy, Some(e)),
        };

        ComponentHealth {
            name: "cache_dir".to_string(),
            status,
            message,
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn probe_writable(root: &Path) -> Result<(), String> {
        let probe = root.join(".health-check");

        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| format!("create_dir_all({root:?}): {e}"))?;

        let data = b"cloudview-health-check";
        tokio::fs::write(&probe, data)
            .await
            .map_err(|e| format!("write({probe:?}): {e}"))?;

        let read_back = tokio::fs::read(&probe)
            .await
            .map_err(|e| format!("read({probe:?}): {e}"))?;
        if read_back != data {
            return Err("read-back mismatch".to_string());
        }

        tokio::fs::remove_file(&probe)
            .await
            .map_err(|e| format!("remove_file({probe:?}): {e}"))?;

        Ok(())
    }

    async fn check_spool(&self) -> ComponentHealth {
        let start = Instant::now();

        let (status, message) = match tokio::fs::metadata(&self.spool_root).await {
            Ok(meta) if meta.is_dir() => (HealthStatus::Healthy, Some("Readable".to_string())),
            Ok(_) => (
                HealthStatus::Degraded,
                Some("Spool root is not a directory".to_string()),
            ),
            Err(e) => (HealthStatus::Degraded, Some(e.to_string())),
        };

        ComponentHealth {
            name: "spool".to_string(),
            status,
            message,
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Server state shared by the health handlers
pub struct ServerState {
    pub health: Arc<HealthChecker>,
}

/// Simple liveness check (Kubernetes)
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness check (Kubernetes)
pub async fn readiness(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = report.http_status();
    (status, Json(report))
}

/// Full health check
pub async fn health(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = report.http_status();
    (status, Json(report))
}

/// Plain OK response for load balancers
pub async fn default_health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir()
            .join("cloudview-health-tests")
            .join(uuid::Uuid::new_v4().to_string())
    }

    #[tokio::test]
    async fn test_health_check_with_writable_cache() {
        let cache_root = temp_dir();
        let spool_root = temp_dir();
        std::fs::create_dir_all(&spool_root).unwrap();

        let checker = HealthChecker::new(HealthConfig::default(), &cache_root, &spool_root);
        let report = checker.check().await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.components.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_spool_degrades() {
        let cache_root = temp_dir();
        let spool_root = temp_dir(); // never created

        let checker = HealthChecker::new(HealthConfig::default(), &cache_root, &spool_root);
        let report = checker.check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.status.is_healthy());
        assert_eq!(report.http_status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_cache() {
        let spool_root = temp_dir();
        std::fs::create_dir_all(&spool_root).unwrap();
        let checker = HealthChecker::new(
            HealthConfig {
                cache_duration: Duration::from_secs(60),
            },
            temp_dir(),
            spool_root,
        );

        let report1 = checker.check().await;
        let report2 = checker.check().await;

        // second call is served from cache
        assert_eq!(report1.timestamp, report2.timestamp);
    }

    #[test]
    fn test_unhealthy_http_status() {
        let report = HealthReport {
            status: HealthStatus::Unhealthy,
            version: "1.0".to_string(),
            uptime_seconds: 1,
            components: vec![],
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(report.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
