//! API key check for `/capi/{api_key}/...` routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Key segment of a `/capi/<key>/...` request path.
fn path_api_key(path: &str) -> Option<&str> {
    path.strip_prefix("/capi/")?.split('/').next()
}

/// Reject requests whose path key is not this node's API key.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let authorized = path_api_key(req.uri().path()).is_some_and(|key| state.api_key_matches(key));
    if !authorized {
        tracing::debug!(path = %req.uri().path(), "Rejected request with wrong API key");
        return ApiError::Unauthorized("invalid API key".to_string()).into_response();
    }
    next.run(req).await
}
