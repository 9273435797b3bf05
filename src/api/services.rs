use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{debug, warn};

use super::{
    error::ApiError,
    models::{HealthResponse, ImportAccepted, ImportRequest},
    state::AppState,
    utils::{parse_content_type, read_body},
    validation::validate_import,
};

/// Batch submission endpoint (POST /imports)
///
/// ## Flow:
/// 1. Require `Content-Type: application/json` (gzip bodies are inflated by
///    the decompression layer)
/// 2. Read the body under the configured size limit
/// 3. Validate the name list against [`ApiLimits`](crate::config::ApiLimits)
/// 4. Hand the names to the batch submitter, which writes one status row and
///    one queued task per file
/// 5. Return 202 Accepted with the batch id; workers pick the tasks up
pub async fn submit_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let limits = &state.config.server.api;
    let body_bytes = read_body(body, limits.max_payload_bytes).await?;

    let request: ImportRequest = serde_json::from_slice(&body_bytes)?;
    validate_import(&request, limits).map_err(|err| ApiError::InvalidPayload(err.to_string()))?;

    let batch_id = state
        .submitter
        .submit(&request.names, request.album_id.as_deref())?;

    let response = ImportAccepted {
        import_batch_id: batch_id,
        file_count: request.names.len(),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Batch status endpoint (GET /imports/{batch_id})
///
/// Unknown batches have no rows and report `all_processed: false`, the same
/// as a batch whose tasks have not been picked up yet.
pub async fn import_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.tracker.batch_status(&batch_id)?;
    debug!(batch_id = %batch_id, all_processed = status.all_processed, "Status polled");
    Ok((StatusCode::OK, Json(status)))
}

/// Health check endpoint (GET /health)
///
/// Probes the queue, the catalog and the object store. Returns 503 when any of
/// them fails.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let checks = [
        ("queue", state.queue.health_check().map_err(|e| e.to_string())),
        ("catalog", state.catalog.health_check().map_err(|e| e.to_string())),
        ("storage", state.storage.health_check().await.map_err(|e| e.to_string())),
    ];
    for (component, result) in checks {
        let status = match result {
            Ok(()) => "healthy".to_string(),
            Err(err) => {
                warn!(component, error = %err, "Health check failed");
                format!("unhealthy: {err}")
            }
        };
        components.insert(component.to_string(), status);
    }

    let all_healthy = components.values().all(|status| status == "healthy");
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        pending_tasks: state.queue.pending().ok(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
