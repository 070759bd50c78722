//! Prompt assembly shared by agents and the general handler.

use atlaserp_messaging::Payload;

/// Prefix `request` with a serialised context block when `context` is non-empty.
pub fn with_context(request: &str, context: &Payload) -> String {
    if context.is_empty() {
        return request.to_string();
    }
    let rendered = serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());
    format!("Context: {rendered}\n\n{request}")
}

/// Text an agent should answer for a queued request payload.
///
/// Prefers a `query` field, then `content`, then the whole payload as JSON.
pub fn payload_query(payload: &Payload) -> String {
    ["query", "content"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| serde_json::Value::Object(payload.clone()).to_string())
}
