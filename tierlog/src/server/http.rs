//! HTTP server implementation for the tiered log store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::signal;

use super::config::ServerConfig;
use super::handlers::{
    AppState, handle_healthy, handle_ingest, handle_metrics, handle_query, handle_ready,
};
use super::metrics::Metrics;
use super::middleware::{MetricsLayer, TracingLayer};
use crate::store::TieredStore;

/// Builds the application router. Integration tests drive this
/// directly without binding a socket.
pub fn router(store: Arc<TieredStore>, metrics: Arc<Metrics>) -> Router {
    let state = AppState {
        store,
        metrics: metrics.clone(),
    };

    Router::new()
        .route("/api/1/service/{id}/logs", post(handle_ingest))
        .route("/api/1/service/{id}/logs/{start}/{end}", get(handle_query))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(TracingLayer::new())
        .layer(MetricsLayer::new(metrics))
        .with_state(state)
}

/// HTTP server for the tiered log store.
pub struct LogServer {
    store: Arc<TieredStore>,
    metrics: Arc<Metrics>,
    config: ServerConfig,
}

impl LogServer {
    /// Create a new log server.
    pub fn new(store: Arc<TieredStore>, metrics: Arc<Metrics>, config: ServerConfig) -> Self {
        Self {
            store,
            metrics,
            config,
        }
    }

    /// Run the HTTP server.
    pub async fn run(self) {
        let app = router(self.store, self.metrics);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting tierlog HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .unwrap();

        tracing::info!("Server shut down gracefully");
    }
}

/// Listen for SIGTERM (K8s pod termination) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
