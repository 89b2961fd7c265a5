//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub simulating: bool,
    pub instructor_controls: bool,
}

/// `GET /api/health`: liveness probe, no actor required.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    // Fails if a handler panicked while holding the connection.
    drop(ctx.core.lock_db()?);

    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        simulating: ctx.core.clock_status().is_simulating,
        instructor_controls: ctx.core.instructor_pin().is_some(),
    }))
}
