//! Medication link endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ApiContext};
use crate::models::{MedicationLink, MedicationLinkInput};

#[derive(Debug, Deserialize)]
pub struct LinkListQuery {
    pub trigger: Option<Uuid>,
}

/// `GET /api/links?trigger=<medicine_id>`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Query(query): Query<LinkListQuery>,
) -> Result<Json<Vec<MedicationLink>>, ApiError> {
    let links = ctx.core.with_protocol(actor.as_str(), |p| match query.trigger {
        Some(trigger) => p.list_medication_links_by_trigger(&trigger),
        None => p.list_medication_links(),
    })??;
    Ok(Json(links))
}

/// `GET /api/links/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicationLink>, ApiError> {
    let link = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.get_medication_link(&id))??;
    Ok(Json(link))
}

/// `POST /api/links`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Json(input): Json<MedicationLinkInput>,
) -> Result<(StatusCode, Json<MedicationLink>), ApiError> {
    let link = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.create_medication_link(&input))??;
    Ok((StatusCode::CREATED, Json(link)))
}

/// `PUT /api/links/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<MedicationLinkInput>,
) -> Result<Json<MedicationLink>, ApiError> {
    let link = ctx
        .core
        .with_protocol(actor.as_str(), |p| p.update_medication_link(&id, &input))??;
    Ok(Json(link))
}

/// `DELETE /api/links/:id`: 409 while protocol instances reference it.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActingUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.core
        .with_protocol(actor.as_str(), |p| p.delete_medication_link(&id))??;
    Ok(StatusCode::NO_CONTENT)
}
