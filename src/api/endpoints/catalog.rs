//! Medicine catalog and prescription endpoints.
//!
//! - `GET /api/medicines`, `POST /api/medicines`
//! - `POST /api/prescriptions`, `GET /api/prescriptions/:id`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ApiContext};
use crate::models::{Medicine, MedicineInput, Prescription, PrescriptionInput};
use crate::protocol::ProtocolError;

#[derive(Serialize)]
pub struct PrescriptionDetail {
    #[serde(flatten)]
    pub prescription: Prescription,
    /// `None` for as-needed orders.
    pub doses_remaining: Option<u32>,
}

/// `GET /api/medicines`
pub async fn list_medicines(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
) -> Result<Json<Vec<Medicine>>, ApiError> {
    let medicines = ctx.core.with_protocol(actor.as_str(), |p| p.list_medicines())??;
    Ok(Json(medicines))
}

/// `POST /api/medicines`
pub async fn create_medicine(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(input): Json<MedicineInput>,
) -> Result<(StatusCode, Json<Medicine>), ApiError> {
    let medicine = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.create_medicine(&input))??;
    Ok((StatusCode::CREATED, Json(medicine)))
}

/// `POST /api/prescriptions`: active from the current simulated time.
pub async fn create_prescription(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(input): Json<PrescriptionInput>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let rx = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.create_prescription(&input))??;
    Ok((StatusCode::CREATED, Json(rx)))
}

/// `GET /api/prescriptions/:id`
pub async fn prescription_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    let detail = ctx.core.with_protocol(actor.as_str(), |p| {
        Ok::<_, ProtocolError>(PrescriptionDetail {
            prescription: p.get_prescription(&id)?,
            doses_remaining: p.doses_remaining(&id)?,
        })
    })??;
    Ok(Json(detail))
}
