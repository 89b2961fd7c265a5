//! Protocol instance endpoints.
//!
//! - `POST /api/protocols`: instantiate a link for one patient
//! - `GET /api/patients/:id/protocols`: instance views
//! - `GET /api/patients/:id/prescriptions/:rx/follow-up-status`: UI preview

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ApiContext};
use crate::models::FollowUpOverrides;
use crate::protocol::{FollowUpStatus, InstantiatedProtocol, ProtocolView};

#[derive(Debug, Deserialize)]
pub struct InstantiateRequest {
    pub patient_id: Uuid,
    pub link_id: Uuid,
    pub trigger_prescription_id: Uuid,
    #[serde(default)]
    pub overrides: FollowUpOverrides,
}

/// `POST /api/protocols`
pub async fn instantiate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(req): Json<InstantiateRequest>,
) -> Result<(StatusCode, Json<InstantiatedProtocol>), ApiError> {
    let created = ctx.core.with_protocol(actor.as_str(), |p| {
        p.instantiate_protocol(&req.patient_id, &req.link_id, &req.trigger_prescription_id, &req.overrides)
    })??;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/patients/:id/protocols`
pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<ProtocolView>>, ApiError> {
    let views = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.list_protocols_for_patient(&patient_id))??;
    Ok(Json(views))
}

/// `GET /api/patients/:id/prescriptions/:rx/follow-up-status`
pub async fn follow_up_status(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path((patient_id, prescription_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FollowUpStatus>, ApiError> {
    let status = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.check_follow_up_status(&patient_id, &prescription_id))??;
    Ok(Json(status))
}
