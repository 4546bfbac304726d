//! Stateless session tokens.
//!
//! A session is an HS256 JWT carried in the `session_token` cookie. It holds
//! the identity returned by the backend together with the backend token, so
//! no server-side session table is needed. Sessions are rolled (re-signed
//! with a fresh expiry) once they are older than the update age.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::Identity;
use crate::roles::{self, Role};

/// Default session lifetime: 30 days
pub const DEFAULT_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// Default age after which a session is re-signed: 24 hours
pub const DEFAULT_UPDATE_AGE_SECS: u64 = 24 * 60 * 60;

/// Longest session lifetime accepted by the configuration: one year
pub const MAX_SESSION_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Claims embedded in the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (backend user id)
    pub sub: String,
    /// Display name
    pub name: String,
    pub email: String,
    /// Role assigned by the backend; unknown values decode as `None`
    #[serde(default, with = "roles::lenient")]
    pub role: Option<Role>,
    /// Backend token, forwarded as the bearer capability on API calls
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Session shape handed to handlers and the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub user: SessionUser,
    /// Expiration time (Unix timestamp)
    pub expires: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub token: String,
}

impl SessionClaims {
    /// Project the claims into the exposed session shape.
    /// Every field written by [`SessionConfig::issue`] shows up here.
    pub fn expose(&self) -> SessionView {
        SessionView {
            user: SessionUser {
                id: self.sub.clone(),
                name: self.name.clone(),
                email: self.email.clone(),
                role: self.role,
                token: self.access_token.clone(),
            },
            expires: self.exp,
        }
    }

    /// Role used for access decisions (missing role means RENTER).
    pub fn effective_role(&self) -> Role {
        roles::effective_role(self.role)
    }

    /// Whether the session is old enough to be re-signed.
    pub fn needs_roll(&self, now: u64, update_age: u64) -> bool {
        now.saturating_sub(self.iat) >= update_age
    }
}

/// Configuration for session signing and validation.
#[derive(Clone)]
pub struct SessionConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: u64,
    update_age: u64,
}

/// A freshly signed session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// The JWT string stored in the cookie
    pub token: String,
    pub claims: SessionClaims,
    /// Cookie lifetime in seconds
    pub max_age: u64,
}

impl SessionConfig {
    /// Create a session configuration with the default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetimes(secret, DEFAULT_MAX_AGE_SECS, DEFAULT_UPDATE_AGE_SECS)
    }

    pub fn with_lifetimes(secret: &[u8], max_age: u64, update_age: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            max_age,
            update_age,
        }
    }

    pub fn update_age(&self) -> u64 {
        self.update_age
    }

    /// Sign a session for a verified identity.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedSession, SessionError> {
        let now = unix_now()?;
        let claims = SessionClaims {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            access_token: identity.token.clone(),
            iat: now,
            exp: self.expiry(now)?,
        };
        self.sign(claims)
    }

    /// Re-sign an existing session with a fresh issue time and expiry.
    pub fn roll(&self, claims: &SessionClaims) -> Result<IssuedSession, SessionError> {
        let now = unix_now()?;
        self.sign(SessionClaims {
            iat: now,
            exp: self.expiry(now)?,
            ..claims.clone()
        })
    }

    fn expiry(&self, now: u64) -> Result<u64, SessionError> {
        now.checked_add(self.max_age)
            .ok_or(SessionError::LifetimeOverflow)
    }

    fn sign(&self, claims: SessionClaims) -> Result<IssuedSession, SessionError> {
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(SessionError::Encoding)?;

        Ok(IssuedSession {
            token,
            claims,
            max_age: self.max_age,
        })
    }

    /// Validate and decode a session token.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
                .map_err(SessionError::Decoding)?;

        Ok(token_data.claims)
    }
}

pub fn unix_now() -> Result<u64, SessionError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| SessionError::TimeError)
}

/// Errors that can occur while signing or reading a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to encode session: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("failed to decode session: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    TimeError,
    #[error("session lifetime overflows the expiry timestamp")]
    LifetimeOverflow,
}
