use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use atlaserp_orchestrator::OrchestratorError;

pub fn orchestrator_error_to_response(err: OrchestratorError) -> axum::response::Response {
    let status = match &err {
        OrchestratorError::NotInitialized | OrchestratorError::QueueClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        OrchestratorError::UnknownAgent(_) => StatusCode::NOT_FOUND,
        OrchestratorError::DuplicateAgent(_) => StatusCode::CONFLICT,
        OrchestratorError::UpstreamCompletion(_) | OrchestratorError::Collaborator(_) => {
            StatusCode::BAD_GATEWAY
        }
        OrchestratorError::AgentInitialization { .. } | OrchestratorError::AgentExecution { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
