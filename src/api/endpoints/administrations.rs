//! Administration endpoints.
//!
//! - `POST /api/administrations/guard`: dry run, returns the decision
//! - `POST /api/administrations`: guard, then record and activate
//! - `DELETE /api/administrations/:id`: instructor only

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ApiContext};
use crate::models::{Administration, AdministrationRequest};
use crate::protocol::{GuardDecision, RecordOutcome, RecordedAdministration};

/// `POST /api/administrations/guard`: always 200; the body carries the decision.
pub async fn guard(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(request): Json<AdministrationRequest>,
) -> Result<Json<GuardDecision>, ApiError> {
    let decision = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.guard_administration(&request))?;
    Ok(Json(decision))
}

/// `POST /api/administrations`: 201 when stored, 422 with the rejection otherwise.
pub async fn record(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(request): Json<AdministrationRequest>,
) -> Result<(StatusCode, Json<RecordedAdministration>), ApiError> {
    let outcome = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.record_administration(&request))??;

    match outcome {
        RecordOutcome::Recorded(recorded) => Ok((StatusCode::CREATED, Json(recorded))),
        RecordOutcome::Rejected(rejection) => Err(ApiError::Rejected(rejection)),
    }
}

/// `DELETE /api/administrations/:id`: returns the removed record.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Administration>, ApiError> {
    let removed = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.delete_administration(&id))??;
    Ok(Json(removed))
}
