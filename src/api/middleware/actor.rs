//! Acting-user middleware.
//!
//! Authentication happens upstream of this service. Every protected route
//! still needs to know who acted, for the audit trail and for the
//! `administered_by` column, so the identifier is required here.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ACTING_USER_HEADER};

/// Require a well-formed `X-Acting-User` header and inject [`ActingUser`].
///
/// The actor is also copied onto the response so the access log can
/// attribute the request.
pub async fn require_actor(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let actor = req
        .headers()
        .get(ACTING_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(ActingUser::parse);

    let Some(actor) = actor else {
        return ApiError::ActorRequired.into_response();
    };

    req.extensions_mut().insert(actor.clone());
    let mut response = next.run(req).await;
    response.extensions_mut().insert(actor);
    response
}
