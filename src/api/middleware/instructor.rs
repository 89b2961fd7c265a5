//! Instructor PIN gate for time travel and record deletion.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::api::types::{ActingUser, ApiContext, INSTRUCTOR_PIN_HEADER};

/// Require `X-Instructor-Pin` to match the configured PIN.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// With no PIN configured every request is refused.
pub async fn require_instructor(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_instructor_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_instructor_inner(
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let expected = ctx.core.instructor_pin().ok_or(ApiError::InstructorDisabled)?;

    let supplied = req
        .headers()
        .get(INSTRUCTOR_PIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !pin_matches(supplied, expected) {
        let actor = req
            .extensions()
            .get::<ActingUser>()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default();
        tracing::warn!(actor = %actor, path = req.uri().path(), "Instructor PIN rejected");
        return Err(ApiError::InstructorRequired);
    }

    Ok(next.run(req).await)
}

/// Constant-time comparison. Length differences short-circuit, which only
/// leaks the PIN length.
fn pin_matches(supplied: &str, expected: &str) -> bool {
    supplied.len() == expected.len() && bool::from(supplied.as_bytes().ct_eq(expected.as_bytes()))
}
