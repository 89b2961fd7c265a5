//! HTTP surface for the protocol engine.
//!
//! Routes are nested under `/api/`. Every route except `/api/health`
//! requires an `X-Acting-User` header; time travel and record deletion
//! additionally require the instructor PIN in `X-Instructor-Pin`.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::{ActingUser, ApiContext};
