//! Login and session endpoints.
//!
//! - POST `/login` - Verify credentials with the backend and set the session cookie
//! - POST `/logout` - Clear the session cookie
//! - GET `/session` - Current session, or `{}` when signed out
//! - POST `/register` - Forward a registration payload to the backend

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;
use url::form_urlencoded;

use super::error::ApiError;
use crate::auth::{MaybeSession, clear_session_cookie, login_redirect, session_cookie};
use crate::backend::{BackendClient, Credential};
use crate::impl_has_session_backend;
use crate::rate_limit::{LoginRateLimit, rate_limit_login};
use crate::session::SessionConfig;

/// The only message shown for a failed login, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Where users land after login when no usable callback was given.
const DEFAULT_CALLBACK: &str = "/dashboard";

#[derive(Clone)]
pub struct AuthApiState {
    pub sessions: Arc<SessionConfig>,
    pub backend: BackendClient,
    pub secure_cookies: bool,
    pub rate_limit: LoginRateLimit,
}

impl_has_session_backend!(AuthApiState);

pub fn router(state: AuthApiState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/register", post(register))
        .with_state(state)
        .merge(login_router)
}

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
    #[serde(rename = "callbackUrl", default)]
    callback_url: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    ok: bool,
    url: String,
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

fn parse_form(body: &[u8]) -> LoginRequest {
    let mut request = LoginRequest::default();
    for (key, value) in form_urlencoded::parse(body) {
        match key.as_ref() {
            "username" => request.username = value.into_owned(),
            "password" => request.password = value.into_owned(),
            "callbackUrl" => request.callback_url = Some(value.into_owned()),
            _ => {}
        }
    }
    request
}

/// Keep a post-login callback only if it is a path on this site.
pub fn safe_callback(callback: Option<&str>) -> String {
    match callback {
        Some(url)
            if url.starts_with('/')
                && !url.starts_with("//")
                && !url.contains('\\')
                && !url.chars().any(char::is_control) =>
        {
            url.to_string()
        }
        _ => DEFAULT_CALLBACK.to_string(),
    }
}

fn login_failed(form: bool, callback: &str) -> Response {
    if form {
        let location = format!("{}&error=CredentialsSignin", login_redirect(callback));
        Redirect::to(&location).into_response()
    } else {
        ApiError::unauthorized(INVALID_CREDENTIALS).into_response()
    }
}

async fn login(State(state): State<AuthApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let form = is_form(&headers);
    let request = if form {
        parse_form(&body)
    } else {
        match serde_json::from_slice::<LoginRequest>(&body) {
            Ok(request) => request,
            Err(_) => return ApiError::bad_request("Invalid login request").into_response(),
        }
    };

    let callback = safe_callback(request.callback_url.as_deref());

    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return login_failed(form, &callback);
    }

    let credential = Credential {
        identifier: username.to_string(),
        secret: request.password,
    };

    let Some(identity) = state.backend.verify(&credential).await else {
        return login_failed(form, &callback);
    };

    let issued = match state.sessions.issue(&identity) {
        Ok(issued) => issued,
        Err(e) => return ApiError::session_error("Failed to issue session", e).into_response(),
    };

    info!(user_id = %identity.id, role = ?identity.role, "Session issued");

    let cookie = session_cookie(&issued.token, issued.max_age, state.secure_cookies);
    if form {
        ([(header::SET_COOKIE, cookie)], Redirect::to(&callback)).into_response()
    } else {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, cookie)],
            Json(LoginResponse {
                ok: true,
                url: callback,
            }),
        )
            .into_response()
    }
}

async fn logout(
    State(state): State<AuthApiState>,
    MaybeSession(session): MaybeSession,
) -> impl IntoResponse {
    if let Some(claims) = session {
        info!(user_id = %claims.sub, "Signed out");
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(state.secure_cookies))],
        Json(json!({ "url": "/login" })),
    )
}

async fn session(MaybeSession(session): MaybeSession) -> Response {
    match session {
        Some(claims) => Json(claims.expose()).into_response(),
        None => Json(json!({})).into_response(),
    }
}

async fn register(State(state): State<AuthApiState>, Json(payload): Json<Value>) -> Json<Value> {
    Json(state.backend.register(&payload).await)
}
