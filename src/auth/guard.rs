//! Route guard middleware.
//!
//! Runs on `/dashboard`, `/admin`, `/owner`, `/renter` and everything below
//! them. For each request it decides between three outcomes:
//!
//! - no valid session: redirect to `/login?callbackUrl=<path>`
//! - valid session on `/dashboard`, or on an area the role may not enter:
//!   redirect to the role's own `<area>/dashboard`
//! - otherwise: forward the request, with the session claims attached
//!
//! Authorization failures are always silent redirects, never error pages.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use super::cookie::session_cookie;
use super::extractors::read_session;
use crate::impl_has_session_backend;
use crate::roles::{Area, Role, path_has_prefix};
use crate::session::{SessionClaims, SessionConfig, unix_now};

/// Generic entry point that dispatches to the role's own dashboard.
const DASHBOARD_PATH: &str = "/dashboard";

const LOGIN_PATH: &str = "/login";

#[derive(Clone)]
pub struct GuardState {
    pub sessions: Arc<SessionConfig>,
    pub secure_cookies: bool,
}

impl_has_session_backend!(GuardState);

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Forward the request unchanged.
    Proceed,
    /// Send the caller to the login page, then back to `callback`.
    RedirectToLogin { callback: String },
    /// Send the caller to the dashboard of their own area.
    RedirectHome(Area),
}

impl GuardDecision {
    /// Redirect target, if this decision is a redirect.
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::Proceed => None,
            GuardDecision::RedirectToLogin { callback } => Some(login_redirect(callback)),
            GuardDecision::RedirectHome(area) => Some(area.dashboard_path()),
        }
    }
}

/// Whether the path is covered by the guard.
pub fn is_protected(path: &str) -> bool {
    path_has_prefix(path, DASHBOARD_PATH) || Area::of_path(path).is_some()
}

fn is_generic_dashboard(path: &str) -> bool {
    path == DASHBOARD_PATH || path.strip_prefix(DASHBOARD_PATH) == Some("/")
}

/// Login page URL that returns to `callback` after signing in.
pub fn login_redirect(callback: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", callback)
        .finish();
    format!("{}?{}", LOGIN_PATH, query)
}

/// Decide what happens to a request for `path`.
///
/// `session` must only be `Some` for a session whose signature and expiry
/// have been checked.
pub fn evaluate(path: &str, session: Option<&SessionClaims>) -> GuardDecision {
    if !is_protected(path) {
        return GuardDecision::Proceed;
    }

    let Some(claims) = session else {
        return GuardDecision::RedirectToLogin {
            callback: path.to_string(),
        };
    };

    let role = match claims.role {
        Some(role) => role,
        None => {
            // Unknown or missing role: restrict to the renter area.
            debug!(user_id = %claims.sub, "Session has no recognised role, using RENTER");
            Role::Renter
        }
    };

    if is_generic_dashboard(path) {
        return GuardDecision::RedirectHome(role.home());
    }

    match Area::of_path(path) {
        Some(area) if !role.may_enter(area) => GuardDecision::RedirectHome(role.home()),
        _ => GuardDecision::Proceed,
    }
}

/// Middleware enforcing the role-to-area table.
pub async fn route_guard(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_protected(&path) {
        return next.run(request).await;
    }

    let claims = read_session(request.headers(), &state.sessions);
    let decision = evaluate(&path, claims.as_ref());

    if let Some(location) = decision.location() {
        debug!(path = %path, location = %location, "Guard redirect");
        return Redirect::temporary(&location).into_response();
    }

    let Some(mut claims) = claims else {
        return next.run(request).await;
    };

    let mut rolled_cookie = None;
    if let Ok(now) = unix_now() {
        if claims.needs_roll(now, state.sessions.update_age()) {
            match state.sessions.roll(&claims) {
                Ok(rolled) => {
                    rolled_cookie = Some(session_cookie(
                        &rolled.token,
                        rolled.max_age,
                        state.secure_cookies,
                    ));
                    claims = rolled.claims;
                }
                Err(e) => error!(error = %e, "Failed to roll session"),
            }
        }
    }

    request.extensions_mut().insert(claims);
    let mut response = next.run(request).await;

    if let Some(cookie) = rolled_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Rolled session cookie is not a valid header"),
        }
    }

    response
}
