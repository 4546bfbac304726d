//! Axum extractors for the session.
//!
//! Behind the route guard the validated claims are already in the request
//! extensions. Elsewhere (API routes) the cookie is validated on the spot.

use axum::{extract::FromRequestParts, http::HeaderMap, http::request::Parts};
use tracing::debug;

use super::cookie::{SESSION_COOKIE_NAME, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasSessionBackend;
use crate::session::{SessionClaims, SessionConfig};

/// Read and validate the session cookie.
///
/// A missing, malformed, wrongly signed or expired cookie all mean "no
/// session".
pub fn read_session(headers: &HeaderMap, sessions: &SessionConfig) -> Option<SessionClaims> {
    let token = get_cookie(headers, SESSION_COOKIE_NAME)?;
    sessions
        .validate(token)
        .inspect_err(|e| debug!(error = %e, "Rejected session cookie"))
        .ok()
}

fn session_from_parts<S>(parts: &Parts, state: &S) -> Result<SessionClaims, AuthErrorKind>
where
    S: HasSessionBackend,
{
    if let Some(claims) = parts.extensions.get::<SessionClaims>() {
        return Ok(claims.clone());
    }

    let token =
        get_cookie(&parts.headers, SESSION_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;
    state
        .sessions()
        .validate(token)
        .map_err(|_| AuthErrorKind::InvalidSession)
}

/// Extractor for handlers that require a session.
/// Rejects with a JSON 401.
pub struct Session(pub SessionClaims);

impl<S> FromRequestParts<S> for Session
where
    S: HasSessionBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state)
            .map(Session)
            .map_err(ApiAuthError::new)
    }
}

/// Optional session extractor - never fails.
pub struct MaybeSession(pub Option<SessionClaims>);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: HasSessionBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(session_from_parts(parts, state).ok()))
    }
}
