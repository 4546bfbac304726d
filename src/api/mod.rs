mod auth;
mod error;
mod proxy;

use axum::Router;
use std::sync::Arc;

use crate::backend::BackendClient;
use crate::rate_limit::LoginRateLimit;
use crate::session::SessionConfig;

pub use auth::{AuthApiState, INVALID_CREDENTIALS, safe_callback};
pub use error::ApiError;
pub use proxy::ProxyState;

/// Create the API router.
pub fn create_api_router(
    sessions: Arc<SessionConfig>,
    backend: BackendClient,
    secure_cookies: bool,
    rate_limit: LoginRateLimit,
) -> Router {
    let auth_state = AuthApiState {
        sessions: sessions.clone(),
        backend: backend.clone(),
        secure_cookies,
        rate_limit,
    };

    let proxy_state = ProxyState { sessions, backend };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/backend", proxy::router(proxy_state))
}
