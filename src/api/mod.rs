// HTTP query and settings surface. Thin by design: anomaly queries read the
// object store, settings updates merge into the KV blob; neither touches the
// detection path directly.

mod anomalies;
mod settings;

pub use anomalies::{create_anomaly_router, AnomalyApiState};
pub use settings::{create_settings_router, SettingsApiState};

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Build the full API router.
pub fn create_api_router(
    anomalies: Arc<AnomalyApiState>,
    settings: Arc<SettingsApiState>,
) -> Router {
    Router::new()
        .merge(anomalies::create_anomaly_router(anomalies))
        .merge(settings::create_settings_router(settings))
        .layer(CorsLayer::permissive())
}
