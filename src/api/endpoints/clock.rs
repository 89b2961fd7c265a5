//! Virtual clock endpoints.
//!
//! Reading the clock is open to any actor; moving it needs the instructor PIN.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ApiContext};
use crate::clock::ClockStatus;

/// Upper bound on one advance: a simulated year.
const MAX_ADVANCE_HOURS: u32 = 24 * 365;

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
}

impl AdvanceRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.hours == 0 && self.minutes == 0 {
            return Err(ApiError::BadRequest("advance must be at least one minute".into()));
        }
        if self.hours > MAX_ADVANCE_HOURS || self.minutes > MAX_ADVANCE_HOURS * 60 {
            return Err(ApiError::BadRequest(format!(
                "advance limited to {MAX_ADVANCE_HOURS} hours per call"
            )));
        }
        Ok(())
    }
}

/// `GET /api/clock`
pub async fn status(State(ctx): State<ApiContext>) -> Json<ClockStatus> {
    Json(ctx.core.clock_status())
}

/// `POST /api/clock/advance`
pub async fn advance(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<ClockStatus>, ApiError> {
    req.validate()?;
    let status = ctx.core.advance_clock(actor.as_str(), req.hours, req.minutes)?;
    Ok(Json(status))
}

/// `POST /api/clock/reset`
pub async fn reset(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
) -> Result<Json<ClockStatus>, ApiError> {
    let status = ctx.core.reset_clock(actor.as_str())?;
    Ok(Json(status))
}
