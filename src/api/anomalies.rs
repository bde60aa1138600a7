use crate::store::{AnomalyFilter, AnomalyStore};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

const DEFAULT_LIMIT: usize = 100;

/// Shared state for the anomaly query API
pub struct AnomalyApiState {
    pub store: AnomalyStore,
}

/// Query parameters for anomaly listing
#[derive(Deserialize)]
pub struct AnomalyQueryParams {
    pub limit: Option<usize>,
    #[serde(rename = "startAfter")]
    pub start_after: Option<String>,
}

/// Listing response envelope
#[derive(Serialize)]
struct AnomalyListResponse {
    success: bool,
    count: usize,
    limit: usize,
    #[serde(rename = "startAfter")]
    start_after: Option<String>,
    data: Vec<serde_json::Value>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the anomaly query router
pub fn create_anomaly_router(state: Arc<AnomalyApiState>) -> Router {
    Router::new()
        .route("/api/anomalies", get(list_all))
        .route("/api/anomalies/districts", get(list_districts))
        .route("/api/anomalies/devices", get(list_devices))
        .with_state(state)
}

/// GET /api/anomalies - every persisted anomaly, newest first
async fn list_all(
    State(state): State<Arc<AnomalyApiState>>,
    Query(params): Query<AnomalyQueryParams>,
) -> Result<Json<AnomalyListResponse>, AnomalyApiError> {
    list(state, params, AnomalyFilter::All).await
}

/// GET /api/anomalies/districts - area-level anomalies only
async fn list_districts(
    State(state): State<Arc<AnomalyApiState>>,
    Query(params): Query<AnomalyQueryParams>,
) -> Result<Json<AnomalyListResponse>, AnomalyApiError> {
    list(state, params, AnomalyFilter::District).await
}

/// GET /api/anomalies/devices - device-level anomalies only
async fn list_devices(
    State(state): State<Arc<AnomalyApiState>>,
    Query(params): Query<AnomalyQueryParams>,
) -> Result<Json<AnomalyListResponse>, AnomalyApiError> {
    list(state, params, AnomalyFilter::Device).await
}

async fn list(
    state: Arc<AnomalyApiState>,
    params: AnomalyQueryParams,
    filter: AnomalyFilter,
) -> Result<Json<AnomalyListResponse>, AnomalyApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    let data = state
        .store
        .list_anomalies(filter, limit, params.start_after.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "Anomaly listing failed");
            AnomalyApiError::StoreUnavailable
        })?;

    Ok(Json(AnomalyListResponse {
        success: true,
        count: data.len(),
        limit,
        start_after: params.start_after,
        data,
    }))
}

/// Query error types
#[derive(Debug)]
enum AnomalyApiError {
    StoreUnavailable,
}

impl IntoResponse for AnomalyApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AnomalyApiError::StoreUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve anomalies",
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
