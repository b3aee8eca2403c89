//! HTTP route handlers for the log server.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::metrics::Metrics;
use super::request::{IngestBody, parse_path_date};
use super::response::logs_body;
use crate::store::TieredStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TieredStore>,
    pub metrics: Arc<Metrics>,
}

/// Handle POST /api/1/service/{id}/logs
///
/// Accepts `{"logs": [...]}`; the whole batch is rejected on any
/// malformed entry.
pub async fn handle_ingest(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let batch = IngestBody::from_body(&body)?;
    let count = state.store.ingest(&service_id, batch.logs).await?;
    state.metrics.ingest_records_total.inc_by(count as u64);

    Ok(Json(serde_json::json!({
        "status": "success",
        "records": count,
    })))
}

/// Handle GET /api/1/service/{id}/logs/{start}/{end}
///
/// Path dates use `%Y-%m-%d-%H-%M-%S`; the range is inclusive. The
/// response body is streamed record by record.
pub async fn handle_query(
    State(state): State<AppState>,
    Path((service_id, start, end)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let start = parse_path_date(&start)?;
    let end = parse_path_date(&end)?;

    let stream = state.store.query(&service_id, start, end).await?;
    state.metrics.query_requests_total.inc();

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        logs_body(stream),
    )
        .into_response())
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> &'static str {
    "OK"
}

/// Handle GET /-/ready
pub async fn handle_ready() -> &'static str {
    "OK"
}
