//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Access log → 2. Actor → 3. Instructor gate (instructor routes only)

use std::sync::Arc;

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the training API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Actor → Handler
    //
    // Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/administrations", post(endpoints::administrations::record))
        .route("/administrations/guard", post(endpoints::administrations::guard))
        .route("/protocols", post(endpoints::protocols::instantiate))
        .route("/patients/:id/protocols", get(endpoints::protocols::list_for_patient))
        .route(
            "/patients/:id/prescriptions/:rx/follow-up-status",
            get(endpoints::protocols::follow_up_status),
        )
        .route(
            "/links",
            get(endpoints::links::list).post(endpoints::links::create),
        )
        .route(
            "/links/:id",
            get(endpoints::links::detail)
                .put(endpoints::links::update)
                .delete(endpoints::links::remove),
        )
        .route(
            "/medicines",
            get(endpoints::catalog::list_medicines).post(endpoints::catalog::create_medicine),
        )
        .route("/prescriptions", post(endpoints::catalog::create_prescription))
        .route("/prescriptions/:id", get(endpoints::catalog::prescription_detail))
        .route("/clock", get(endpoints::clock::status))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::actor::require_actor))
        .layer(axum::Extension(ctx.clone()));

    // Instructor routes: actor first, then the PIN gate.
    let instructor = Router::new()
        .route("/administrations/:id", delete(endpoints::administrations::remove))
        .route("/clock/advance", post(endpoints::clock::advance))
        .route("/clock/reset", post(endpoints::clock::reset))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::instructor::require_instructor))
        .layer(axum::middleware::from_fn(middleware::actor::require_actor))
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .nest("/api", instructor)
        .nest("/api", public)
        .layer(axum::middleware::from_fn(middleware::access_log::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
