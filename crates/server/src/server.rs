//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration for the chat, ingest, health and metrics endpoints
//! - Downstream client lifecycle (broker connection, answer service channel)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{chat, health, ingest, not_found};
use crate::state::ServerState;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use gateway::observe::{LATENCY_BUCKETS, REQUEST_LATENCY_SECONDS};
use gateway::{
    AmqpPublisher, DialogueCoordinator, IngestionCoordinator, LocalFileStore, MetricsObserver,
    Observer, RagAnswerClient,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Build the Axum router with all routes and middleware
///
/// Middleware stack (applied in reverse order):
/// 1. Request ID tracking
/// 2. Request logging
/// 3. Timeout handling
/// 4. Compression
/// 5. CORS
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/api/v1/chat", post(chat::chat))
        .route(
            "/api/v1/ingest",
            post(ingest::ingest).layer(DefaultBodyLimit::max(state.config.max_upload_size())),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server
///
/// Connects to the broker first; if every attempt fails the error is returned
/// and the port is never bound. The broker connection is closed on every exit
/// path once it has been established.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
///
/// # Shutdown
///
/// The server drains in-flight requests on:
/// - SIGTERM (Unix/Linux)
/// - Ctrl+C (all platforms)
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config.log_level);

    let metrics = if config.metrics_enabled {
        Some(install_metrics_recorder()?)
    } else {
        None
    };

    tracing::info!(queue = %config.queue_name, "Connecting to RabbitMQ");
    let publisher = Arc::new(
        AmqpPublisher::connect(&config.broker_config())
            .await
            .context("Failed to connect to RabbitMQ")?,
    );
    tracing::info!("Connected to RabbitMQ");

    let result = serve(config, publisher.clone(), metrics).await;

    publisher.close().await;
    tracing::info!("Server shutdown complete");
    result
}

async fn serve(
    config: ServerConfig,
    publisher: Arc<AmqpPublisher>,
    metrics: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let answers = RagAnswerClient::connect_lazy(&config.rag_service_url, config.answer_timeout())
        .context("Failed to connect to RAG service")?;
    tracing::info!(addr = %config.rag_service_url, "RAG service client ready");

    let observer: Arc<dyn Observer> = Arc::new(MetricsObserver);
    let dialogue = DialogueCoordinator::new(Arc::new(answers), observer.clone());
    let ingestion = IngestionCoordinator::new(
        Arc::new(LocalFileStore::new(&config.upload_path)),
        publisher,
        observer,
    )
    .with_concurrency(config.ingest_concurrency);

    let addr: SocketAddr = config.socket_addr()?;
    tracing::info!(
        "Timeout: {}s, Max body: {}MB, Max upload: {}MB",
        config.timeout_secs,
        config.max_body_size_mb,
        config.max_upload_size_mb
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        config.enable_cors,
        config.metrics_enabled
    );

    let state = Arc::new(ServerState::new(config, dialogue, ingestion).with_metrics(metrics));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Starting neuro gateway on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(log_level: &str) {
    // A subscriber may already be installed by an embedding process or test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init();
}

fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_LATENCY_SECONDS.to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            ticker.tick().await;
            upkeep.run_upkeep();
        }
    });

    Ok(handle)
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
