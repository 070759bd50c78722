use std::time::Instant;

use axum::{
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::context::UserContext;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Attach a `UserContext` to the request and log its completion.
pub async fn request_context(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let user = UserContext::new(extract_user(req.headers()));
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(user);

    let started = Instant::now();
    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

fn extract_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(USER_ID_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blank_or_missing_user_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(extract_user(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" u-42 "));
        assert_eq!(extract_user(&headers).as_deref(), Some("u-42"));
    }
}
