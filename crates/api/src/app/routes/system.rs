use axum::{Json, extract::Extension, response::IntoResponse};

use crate::context::AppContext;

pub async fn health(Extension(ctx): Extension<AppContext>) -> impl IntoResponse {
    let orchestrator = ctx.orchestrator();
    Json(serde_json::json!({
        "status": "ok",
        "orchestrator": orchestrator.state().as_str(),
        "agents": orchestrator.agent_names().len(),
    }))
}
