//! Authenticated pass-through to backend collaborators.
//!
//! `/api/backend/{*path}` forwards to `{API_BASE}/{path}` with the session's
//! backend token as the bearer credential, so the browser never needs to
//! handle the backend token for these calls.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{Method, Uri},
    response::IntoResponse,
    routing::any,
};
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::Session;
use crate::backend::BackendClient;
use crate::impl_has_session_backend;
use crate::session::SessionConfig;

#[derive(Clone)]
pub struct ProxyState {
    pub sessions: Arc<SessionConfig>,
    pub backend: BackendClient,
}

impl_has_session_backend!(ProxyState);

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/{*path}", any(forward))
        .with_state(state)
}

/// Whether any segment would be resolved as `.` or `..` by a URL parser,
/// counting `\` as a separator and `%2e` as a dot.
fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

async fn forward(
    State(state): State<ProxyState>,
    Session(claims): Session,
    method: Method,
    Path(path): Path<String>,
    uri: Uri,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if has_dot_segment(&path) {
        return Err(ApiError::bad_request("Invalid backend path"));
    }

    let body: Option<Value> = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|_| ApiError::bad_request("Request body must be JSON"))?,
        )
    };

    let target = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };

    let (status, envelope) = state
        .backend
        .call(method, &target, body.as_ref(), &claims.access_token)
        .await;

    Ok((status, Json(envelope)))
}
