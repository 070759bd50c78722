use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use atlaserp_messaging::{AgentMessage, Source, Target};
use atlaserp_orchestrator::OrchestratorError;

use crate::app::dto::{ChatRequest, SendMessageRequest, SendMessageResponse};
use crate::app::errors::{json_error, orchestrator_error_to_response};
use crate::context::{AppContext, UserContext};

pub async fn chat(
    Extension(ctx): Extension<AppContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<ChatRequest>,
) -> axum::response::Response {
    if body.message.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "validation_error", "message is required");
    }
    let orchestrator = ctx.orchestrator();
    if !orchestrator.is_initialized() {
        return orchestrator_error_to_response(OrchestratorError::NotInitialized);
    }

    let outcome = orchestrator
        .process_request(body.into_agent_request(user.user_id()))
        .await;
    (StatusCode::OK, Json(outcome)).into_response()
}

pub async fn all_statuses(Extension(ctx): Extension<AppContext>) -> impl IntoResponse {
    Json(ctx.orchestrator().get_agent_status(None))
}

pub async fn agent_status(
    Extension(ctx): Extension<AppContext>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    Json(ctx.orchestrator().get_agent_status(Some(&name)))
}

pub async fn all_capabilities(Extension(ctx): Extension<AppContext>) -> impl IntoResponse {
    Json(ctx.orchestrator().get_agent_capabilities(None))
}

pub async fn agent_capabilities(
    Extension(ctx): Extension<AppContext>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    Json(ctx.orchestrator().get_agent_capabilities(Some(&name)))
}

pub async fn send_message(
    Extension(ctx): Extension<AppContext>,
    Json(body): Json<SendMessageRequest>,
) -> axum::response::Response {
    let source = match body.source {
        Some(source) => match Source::try_from(source) {
            Ok(source) => source,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_source", e.to_string()),
        },
        None => Source::External,
    };
    let target = match Target::try_from(body.target) {
        Ok(target) => target,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_target", e.to_string()),
    };

    let message =
        AgentMessage::new(body.message_type, source, target, body.payload).with_priority(body.priority);

    match ctx.orchestrator().send_message(message) {
        Ok(message_id) => {
            debug!(message_id = %message_id, "message accepted");
            (
                StatusCode::ACCEPTED,
                Json(SendMessageResponse {
                    message_id,
                    status: "queued",
                }),
            )
                .into_response()
        }
        Err(err) => orchestrator_error_to_response(err),
    }
}

pub async fn message_stats(Extension(ctx): Extension<AppContext>) -> impl IntoResponse {
    Json(ctx.orchestrator().drain_stats())
}
