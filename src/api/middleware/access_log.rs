//! Request logging middleware.
//!
//! Logs method, path, status and latency for every API request. The acting
//! user is logged by id when the actor middleware has already run.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ActingUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let actor = response
        .extensions()
        .get::<ActingUser>()
        .map(|a| a.as_str().to_string())
        .unwrap_or_default();

    if status >= 500 {
        tracing::error!(%method, path = %path, status, elapsed_ms, actor = %actor, "API request failed");
    } else {
        tracing::info!(%method, path = %path, status, elapsed_ms, actor = %actor, "API request");
    }
    response
}
