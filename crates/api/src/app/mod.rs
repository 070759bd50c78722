//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: settings and orchestrator construction
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::context::AppContext;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/ai", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_context))
                .layer(Extension(ctx)),
        )
}
