//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration for the accumulator endpoints
//! - Middleware stack (request IDs, logging, timeouts, CORS)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id, request_timeout};
use crate::routes::{centroid, method_not_allowed, not_found, status};
use crate::state::ServerState;
use crate::telemetry::{init_tracing, install_metrics};
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Every known path answers other methods with 405 and the JSON error
/// envelope; unknown paths get 404. `/status` is GET only, so HEAD is
/// rejected there too. `/ready` and `/metrics` keep axum's implicit HEAD.
///
/// Middleware stack (outermost first):
/// 1. Tracing
/// 2. Request ID tracking
/// 3. Request logging
/// 4. CORS
/// 5. Timeout handling
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
        .route(
            "/status",
            get(status::status)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route("/ready", get(status::readiness).fallback(method_not_allowed))
        .route("/metrics", get(status::metrics).fallback(method_not_allowed))
        .route(
            "/centroid",
            post(centroid::ingest_centroid).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(from_fn_with_state(state.clone(), request_timeout))
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the centroid HTTP server
///
/// Initializes logging and metrics, opens the configured store, makes sure
/// the aggregate exists, and serves until SIGTERM or Ctrl+C.
///
/// If the store cannot be reached at start-up the server logs a warning and
/// serves anyway; ingests treat a missing aggregate as zeros and `/ready`
/// reports the outage.
///
/// # Example
///
/// ```rust,no_run
/// use clap::Parser;
/// use server::{Cli, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load(&Cli::parse())?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config.log_level)?;

    let mut state = ServerState::new(config.clone())?;
    if config.metrics_enabled {
        state = state.with_metrics(install_metrics()?);
    }

    match state.accumulator.initialize().await {
        Ok(aggregate) => tracing::info!(
            dim = aggregate.dim(),
            store = state.accumulator.store_name(),
            "aggregate ready"
        ),
        Err(err) => tracing::warn!(
            store = state.accumulator.store_name(),
            error = %err,
            "could not initialize aggregate, serving anyway"
        ),
    }

    let app = build_router(Arc::new(state));

    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        "Starting centroid server on {} with dim {}",
        addr,
        config.accumulator.dim
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB, Store timeout: {}ms",
        config.timeout_secs,
        config.max_body_size_mb,
        config.accumulator.store_timeout.as_millis()
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        config.enable_cors,
        config.metrics_enabled
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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
