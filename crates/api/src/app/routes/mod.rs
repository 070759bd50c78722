use axum::{
    Router,
    routing::{get, post},
};

pub mod ai;
pub mod system;

/// Router for the `/ai` endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/chat", post(ai::chat))
        .route("/agents/status", get(ai::all_statuses))
        .route("/agents/status/:name", get(ai::agent_status))
        .route("/agents/capabilities", get(ai::all_capabilities))
        .route("/agents/capabilities/:name", get(ai::agent_capabilities))
        .route("/messages", post(ai::send_message))
        .route("/messages/stats", get(ai::message_stats))
}
