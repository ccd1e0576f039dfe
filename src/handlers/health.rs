use axum::{extract::State, http::StatusCode, response::Json};
use tracing::{instrument, warn};
use crate::schemas::{AppState, HealthResponse};

const HEALTH_CHECK_KEY: &str = "health/check";

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Service is unhealthy", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let db_status = match state.db.ping().await {
        Ok(_) => "connected".to_string(),
        Err(e) => {
            warn!("Database ping failed: {}", e);
            "disconnected".to_string()
        }
    };

    let disk = format!("{:?}", state.settings.storage.disk).to_lowercase();
    let storage_status = match state.media.exists(HEALTH_CHECK_KEY).await {
        Ok(_) => format!("{disk}: available"),
        Err(e) => {
            warn!("Media store check failed: {}", e);
            format!("{disk}: unavailable")
        }
    };

    let status = if db_status == "connected" { "healthy" } else { "degraded" };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        storage: storage_status,
    }))
}
