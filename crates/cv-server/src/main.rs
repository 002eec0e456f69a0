//! Cloudview RS Server
//!
//! HTTP server wiring the attachment viewer plugin surface: the plugin
//! actions, the public cache and PDF viewer mounts, health and metrics.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cv_core::config::{AppConfig, CacheConfig};
use cv_viewer::{SpoolMessageStore, ViewerResolver};

mod health;
mod metrics;

use health::{HealthChecker, HealthConfig, ServerState};
use metrics::Metrics;

/// Mount point of the bundled PDF viewer assets.
const VIEWER_ASSETS_MOUNT: &str = "/viewer/pdfjs";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    init_tracing();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        enabled = config.viewer.enabled,
        "Starting Cloudview RS"
    );

    // The cache directory must exist before the first click and before
    // ServeDir starts answering for it.
    tokio::fs::create_dir_all(&config.cache.root).await?;

    let store = Arc::new(SpoolMessageStore::new(&config.store.spool_root));
    let state = cv_api::AppState::new(config.clone(), store);
    let metrics = Arc::new(Metrics::new(state.resolver.clone()));
    let server_state = Arc::new(ServerState {
        health: Arc::new(HealthChecker::new(
            HealthConfig::default(),
            &config.cache.root,
            &config.store.spool_root,
        )),
    });

    if config.cache.max_age_secs > 0 {
        spawn_sweeper(state.resolver.clone(), metrics.clone(), &config.cache);
    }

    // Build router
    let app = build_router(state, server_state, metrics);

    // Start server
    let addr = config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,cv_server=debug,cv_api=debug,cv_viewer=debug,tower_http=debug".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Build the application router
fn build_router(
    state: cv_api::AppState,
    server_state: Arc<ServerState>,
    metrics: Arc<Metrics>,
) -> Router {
    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(health::default_health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health/full", get(health::health))
        .with_state(server_state);

    // Metrics routes
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/metrics.json", get(metrics::json_metrics))
        .with_state(metrics.clone());

    let config = state.config.clone();

    // Main router
    Router::new()
        .merge(health_routes)
        .merge(metrics_routes)
        .merge(cv_api::router().with_state(state))
        .nest_service(
            &config.cache.public_path,
            ServeDir::new(&config.cache.root),
        )
        .nest_service(
            VIEWER_ASSETS_MOUNT,
            ServeDir::new(&config.viewer.pdf_viewer_assets_dir),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .layer(middleware::from_fn_with_state(
            metrics,
            metrics::metrics_middleware,
        ))
}

/// Periodically remove cache entries older than the configured age.
fn spawn_sweeper(resolver: Arc<ViewerResolver>, metrics: Arc<Metrics>, cache: &CacheConfig) {
    let max_age = Duration::from_secs(cache.max_age_secs);
    let every = Duration::from_secs(cache.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match resolver.cache().sweep_older_than(max_age).await {
                Ok(removed) => {
                    metrics.record_sweep(removed);
                    if removed > 0 {
                        info!(removed, "Cache sweep removed stale renditions");
                    }
                }
                Err(e) => {
                    metrics.record_sweep_failure();
                    warn!(error = %e, "Cache sweep failed");
                }
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use cv_viewer::{AttachmentDescriptor, RenditionCache, ViewRequest};
    use tower::ServiceExt;

    fn temp_dir(label: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join("cloudview-server-tests")
            .join(format!("{label}-{}", uuid::Uuid::new_v4()))
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.viewer.salt_secret = "s3cret".into();
        config.cache.root = temp_dir("cache").to_string_lossy().into_owned();
        config.store.spool_root = temp_dir("spool").to_string_lossy().into_owned();
        config
    }

    fn test_app(config: &AppConfig) -> Router {
        let store = Arc::new(SpoolMessageStore::new(&config.store.spool_root));
        let state = cv_api::AppState::new(config.clone(), store);
        let metrics = Arc::new(Metrics::new(state.resolver.clone()));
        let server_state = Arc::new(ServerState {
            health: Arc::new(HealthChecker::new(
                HealthConfig::default(),
                &config.cache.root,
                &config.store.spool_root,
            )),
        });
        build_router(state, server_state, metrics)
    }

    fn spool_part(config: &AppConfig, message_id: &str, mime_id: &str, data: &[u8]) {
        let dir = std::path::Path::new(&config.store.spool_root).join(message_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(mime_id), data).unwrap();
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let config = test_config();
        let app = test_app(&config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let config = test_config();
        let app = test_app(&config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_view_action_noop_without_payload() {
        let config = test_config();
        let app = test_app(&config);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/plugin/cloudview/view")
                    .header(header::HOST, "mail.example.com")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(""))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_view_action_then_cached_file_is_served() {
        let config = test_config();
        spool_part(&config, "4711", "2.1", b"%PDF-1.7 test");
        let app = test_app(&config);

        let request = ViewRequest::new(
            "4711",
            AttachmentDescriptor::new("2.1", "application/pdf", "contract.pdf"),
        );
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("_uid", "4711");
        form.append_pair("_info", &request.canonical_json());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/plugin/cloudview/view")
                    .header(header::HOST, "mail.example.com")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.finish()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // the rendition is now served from the public cache mount
        let key = RenditionCache::cache_key(&request, "s3cret");
        let cached = app
            .oneshot(
                Request::builder()
                    .uri(format!("/cache/{key}.pdf"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(cached.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(cached.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.7 test");
    }
}
