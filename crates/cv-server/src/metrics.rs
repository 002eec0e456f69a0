//! Metrics and Observability
//!
//! Prometheus-compatible counters for HTTP traffic, the rendition cache
//! and the sweeper.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use cv_viewer::{ViewerResolver, ViewerStats};
use tracing::{debug, info_span, Instrument};

/// Metrics collector
pub struct Metrics {
    /// Total HTTP requests
    pub http_requests_total: AtomicU64,
    /// HTTP requests by status code (2xx, 4xx, 5xx)
    pub http_requests_2xx: AtomicU64,
    pub http_requests_4xx: AtomicU64,
    pub http_requests_5xx: AtomicU64,
    /// Total request duration in milliseconds
    pub http_request_duration_ms_total: AtomicU64,
    /// Cache sweeper runs
    pub sweeps_completed: AtomicU64,
    pub sweeps_failed: AtomicU64,
    pub swept_files_total: AtomicU64,
    /// Resolver whose cache counters are exported
    resolver: Arc<ViewerResolver>,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new(resolver: Arc<ViewerResolver>) -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_requests_2xx: AtomicU64::new(0),
            http_requests_4xx: AtomicU64::new(0),
            http_requests_5xx: AtomicU64::new(0),
            http_request_duration_ms_total: AtomicU64::new(0),
            sweeps_completed: AtomicU64::new(0),
            sweeps_failed: AtomicU64::new(0),
            swept_files_total: AtomicU64::new(0),
            resolver,
            start_time: Instant::now(),
        }
    }

    /// Record an HTTP request
    pub fn record_request(&self, status: StatusCode, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
        self.http_request_duration_ms_total
            .fetch_add(duration_ms, Ordering::Relaxed);

        let code = status.as_u16();
        if (200..300).contains(&code) {
            self.http_requests_2xx.fetch_add(1, Ordering::Relaxed);
        } else if (400..500).contains(&code) {
            self.http_requests_4xx.fetch_add(1, Ordering::Relaxed);
        } else if code >= 500 {
            self.http_requests_5xx.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a sweeper run
    pub fn record_sweep(&self, removed: usize) {
        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
        self.swept_files_total
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn record_sweep_failure(&self) {
        self.sweeps_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn viewer_stats(&self) -> &ViewerStats {
        self.resolver.stats()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP http_requests_total Total number of HTTP requests\n");
        output.push_str("# TYPE http_requests_total counter\n");
        output.push_str(&format!(
            "http_requests_total {}\n",
            self.http_requests_total.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP http_requests_by_status HTTP requests by status code range\n");
        output.push_str("# TYPE http_requests_by_status counter\n");
        output.push_str(&format!(
            "http_requests_by_status{{status=\"2xx\"}} {}\n",
            self.http_requests_2xx.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "http_requests_by_status{{status=\"4xx\"}} {}\n",
            self.http_requests_4xx.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "http_requests_by_status{{status=\"5xx\"}} {}\n",
            self.http_requests_5xx.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP http_request_duration_ms_total Total HTTP request duration in milliseconds\n",
        );
        output.push_str("# TYPE http_request_duration_ms_total counter\n");
        output.push_str(&format!(
            "http_request_duration_ms_total {}\n",
            self.http_request_duration_ms_total.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP cache_hits_total Rendition cache hits\n");
        output.push_str("# TYPE cache_hits_total counter\n");
        output.push_str(&format!(
            "cache_hits_total {}\n",
            self.viewer_stats().cache_hits()
        ));

        output.push_str("# HELP cache_misses_total Rendition cache misses\n");
        output.push_str("# TYPE cache_misses_total counter\n");
        output.push_str(&format!(
            "cache_misses_total {}\n",
            self.viewer_stats().cache_misses()
        ));

        output.push_str("# HELP cache_sweeps_total Completed cache sweeper runs\n");
        output.push_str("# TYPE cache_sweeps_total counter\n");
        output.push_str(&format!(
            "cache_sweeps_total {}\n",
            self.sweeps_completed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP cache_sweeps_failed_total Failed cache sweeper runs\n");
        output.push_str("# TYPE cache_sweeps_failed_total counter\n");
        output.push_str(&format!(
            "cache_sweeps_failed_total {}\n",
            self.sweeps_failed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP cache_swept_files_total Files removed by the sweeper\n");
        output.push_str("# TYPE cache_swept_files_total counter\n");
        output.push_str(&format!(
            "cache_swept_files_total {}\n",
            self.swept_files_total.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP uptime_seconds Server uptime in seconds\n");
        output.push_str("# TYPE uptime_seconds gauge\n");
        output.push_str(&format!("uptime_seconds {}\n", self.uptime_seconds()));

        output
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        serde_json::json!({
            "http": {
                "requests_total": self.http_requests_total.load(Ordering::Relaxed),
                "requests_2xx": self.http_requests_2xx.load(Ordering::Relaxed),
                "requests_4xx": self.http_requests_4xx.load(Ordering::Relaxed),
                "requests_5xx": self.http_requests_5xx.load(Ordering::Relaxed),
                "request_duration_ms_total": self.http_request_duration_ms_total.load(Ordering::Relaxed),
            },
            "cache": {
                "hits": self.viewer_stats().cache_hits(),
                "misses": self.viewer_stats().cache_misses(),
                "sweeps_completed": self.sweeps_completed.load(Ordering::Relaxed),
                "sweeps_failed": self.sweeps_failed.load(Ordering::Relaxed),
                "swept_files": self.swept_files_total.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
    }
}

/// Metrics middleware
pub async fn metrics_middleware(
    State(metrics): State<Arc<Metrics>>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let response = next
        .run(request)
        .instrument(info_span!("http_request", %method, %uri))
        .await;

    let duration = start.elapsed();
    let status = response.status();

    debug!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    metrics.record_request(status, duration.as_millis() as u64);

    response
}

/// Handler for /metrics endpoint (Prometheus format)
pub async fn prometheus_metrics(State(metrics): State<Arc<Metrics>>) -> String {
    metrics.export_prometheus()
}

/// Handler for /metrics.json endpoint
pub async fn json_metrics(State(metrics): State<Arc<Metrics>>) -> axum::Json<serde_json::Value> {
    axum::Json(metrics.export_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_metrics() -> Metrics {
        let config = cv_core::config::AppConfig::default();
        let cache_root = std::env::temp_dir()
            .join("cloudview-metrics-tests")
            .join(uuid::Uuid::new_v4().to_string());
        let resolver = ViewerResolver::new(
            cv_viewer::RenditionCache::new(cache_root),
            config.viewer,
            config.cache.public_path,
        );
        Metrics::new(Arc::new(resolver))
    }

    #[test]
    fn test_record_request() {
        let metrics = test_metrics();

        metrics.record_request(StatusCode::OK, 50);
        metrics.record_request(StatusCode::NOT_FOUND, 10);
        metrics.record_request(StatusCode::INTERNAL_SERVER_ERROR, 100);

        assert_eq!(metrics.http_requests_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.http_requests_2xx.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.http_requests_4xx.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.http_requests_5xx.load(Ordering::Relaxed), 1);
        assert_eq!(
            metrics.http_request_duration_ms_total.load(Ordering::Relaxed),
            160
        );
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = test_metrics();
        metrics.record_request(StatusCode::OK, 50);
        metrics.viewer_stats().record_miss();
        metrics.viewer_stats().record_hit();

        let output = metrics.export_prometheus();
        assert!(output.contains("http_requests_total 1"));
        assert!(output.contains("cache_hits_total 1"));
        assert!(output.contains("cache_misses_total 1"));
        assert!(output.contains("uptime_seconds"));
    }

    #[test]
    fn test_json_export() {
        let metrics = test_metrics();
        metrics.record_request(StatusCode::OK, 50);
        metrics.record_sweep(3);
        metrics.record_sweep_failure();

        let json = metrics.export_json();
        assert_eq!(json["http"]["requests_total"], 1);
        assert_eq!(json["cache"]["sweeps_completed"], 1);
        assert_eq!(json["cache"]["sweeps_failed"], 1);
        assert_eq!(json["cache"]["swept_files"], 3);
    }
}
