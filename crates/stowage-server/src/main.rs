//! Stowage Server
//!
//! Serves attachment content, archives and thumbnails over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stowage_api::AppState;
use stowage_attachments::{AttachmentService, LocalStorage, MemoryMetaStorage};
use stowage_core::config::AppConfig;
use stowage_thumbnails::{FallbackImage, MemoryThumbnailStorage, SpecRegistry, ThumbnailCache};

mod health;

use health::HealthChecker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        AppConfig::default()
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        storage = %config.storage.local_path,
        "Starting Stowage"
    );

    tokio::fs::create_dir_all(&config.storage.local_path)
        .await
        .with_context(|| format!("creating storage directory {}", config.storage.local_path))?;

    let (state, health) = build_state(&config)?;
    let app = build_router(state, health, config.server.max_body_size_bytes);

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
                "info,stowage_server=debug,stowage_api=debug,tower_http=debug".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Wire storage backends, the coordinator and the thumbnail cache
fn build_state(config: &AppConfig) -> anyhow::Result<(AppState, Arc<HealthChecker>)> {
    let specs = SpecRegistry::from_config(&config.thumbnails.specs)
        .context("invalid thumbnail specs")?;
    info!(
        specs = ?specs.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Thumbnail specs loaded"
    );

    let blob = Arc::new(LocalStorage::new(&config.storage.local_path));
    let meta = Arc::new(MemoryMetaStorage::new());
    let fallback = FallbackImage::new(config.thumbnails.default_thumbnail.as_ref().map(PathBuf::from));

    let health = HealthChecker::new(specs.len()).with_storage_root(&config.storage.local_path);

    let attachments = AttachmentService::new(blob.clone(), meta.clone());
    let thumbnails = ThumbnailCache::new(
        blob,
        meta,
        Arc::new(MemoryThumbnailStorage::new()),
        Arc::new(specs),
        Arc::new(fallback),
    );

    let state = AppState::new(attachments, thumbnails).with_cache_days(config.cache.max_age_days);
    Ok((state, Arc::new(health)))
}

/// Build the application router
fn build_router(state: AppState, health: Arc<HealthChecker>, max_body_size: usize) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(health);

    Router::new()
        .merge(health_routes)
        .merge(stowage_api::router().with_state(state))
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_size))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
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
