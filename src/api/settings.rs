use crate::settings::{SettingsStore, SettingsUpdate};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Shared state for the settings API
pub struct SettingsApiState {
    pub store: SettingsStore,
}

#[derive(Serialize)]
struct GetSettingsResponse {
    success: bool,
    settings: crate::settings::AnomalySettings,
}

#[derive(Serialize)]
struct UpdateSettingsResponse {
    success: bool,
    message: String,
    settings: crate::settings::AnomalySettings,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the settings router
pub fn create_settings_router(state: Arc<SettingsApiState>) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings))
        .route("/api/settings/update", put(update_settings))
        .with_state(state)
}

/// GET /api/settings - current live settings
async fn get_settings(State(state): State<Arc<SettingsApiState>>) -> Json<GetSettingsResponse> {
    Json(GetSettingsResponse {
        success: true,
        settings: state.store.current(),
    })
}

/// PUT /api/settings/update - validated partial merge into the stored blob.
/// The merged value is persisted first, then swapped into the live cell; the
/// aggregators pick it up on their next evaluation.
async fn update_settings(
    State(state): State<Arc<SettingsApiState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<UpdateSettingsResponse>, SettingsApiError> {
    let merged = update
        .apply(state.store.current())
        .map_err(|e| SettingsApiError::Validation(e.to_string()))?;

    let settings = state.store.persist(merged).await.map_err(|e| {
        error!(error = %e, "Settings persist failed");
        SettingsApiError::StoreUnavailable
    })?;

    Ok(Json(UpdateSettingsResponse {
        success: true,
        message: "Settings updated successfully".to_string(),
        settings,
    }))
}

/// Settings error types
#[derive(Debug)]
enum SettingsApiError {
    Validation(String),
    StoreUnavailable,
}

impl IntoResponse for SettingsApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            SettingsApiError::Validation(errors) => (StatusCode::BAD_REQUEST, errors),
            SettingsApiError::StoreUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update settings".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
