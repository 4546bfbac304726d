//! Client for the remote property-management API.
//!
//! Only the login exchange is interpreted here. Every other call is a
//! pass-through: the payload and the `{ success, data | error }` envelope
//! are treated as opaque JSON.

pub mod preview;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::roles::{self, Role};
use preview::decode_token_preview;

/// Default timeout for a single backend request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const UNREACHABLE: &str = "Network error or server is unreachable";

const INVALID_PATH: &str = "Invalid backend path";

/// Login credentials submitted by the user. Never persisted or logged.
#[derive(Clone)]
pub struct Credential {
    /// Email address or phone number
    pub identifier: String,
    pub secret: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Identity recovered from a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    /// Backend token, kept opaque
    pub token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "emailOrPhonenumber")]
    email_or_phonenumber: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    data: Value,
}

fn default_success() -> bool {
    true
}

/// User object returned by older backend revisions.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginUser {
    #[serde(deserialize_with = "preview::string_or_number")]
    id: String,
    full_name: Option<String>,
    email: Option<String>,
    #[serde(default, with = "roles::lenient")]
    role: Option<Role>,
    access_token: Option<String>,
    token: Option<String>,
}

/// HTTP client bound to the backend base URL.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    /// Build an endpoint URL below the base, keeping the base path.
    ///
    /// The joined URL is normalized the same way the HTTP client would
    /// normalize it (`\` as `/`, `%2e` as `.`); `None` when the result
    /// leaves the base path or carries a fragment.
    pub fn endpoint(&self, path: &str) -> Option<Url> {
        let url = Url::parse(&format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
        .ok()?;

        let base_path = self.base.path().trim_end_matches('/');
        let below_base = url
            .path()
            .strip_prefix(base_path)
            .is_some_and(|rest| rest.starts_with('/'));

        (url.origin() == self.base.origin() && below_base && url.fragment().is_none())
            .then_some(url)
    }

    /// Exchange credentials for an identity.
    ///
    /// Returns `None` for every failure: rejected credentials, an unreachable
    /// backend, an unexpected body, or a token whose payload cannot be read.
    /// Callers cannot tell these apart.
    pub async fn verify(&self, credential: &Credential) -> Option<Identity> {
        let url = self.endpoint("auth/login")?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                email_or_phonenumber: &credential.identifier,
                password: &credential.secret,
            })
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "Backend login request failed"))
            .ok()?;

        let status = response.status();
        if !status.is_success() {
            info!(status = status.as_u16(), "Backend rejected login");
            return None;
        }

        let envelope: LoginEnvelope = response
            .json()
            .await
            .inspect_err(|e| warn!(error = %e, "Backend login response is not JSON"))
            .ok()?;

        let identity = identity_from_envelope(envelope, &credential.identifier)?;
        info!(user_id = %identity.id, role = ?identity.role, "Login verified");
        Some(identity)
    }

    /// Forward a registration payload unchanged.
    pub async fn register(&self, payload: &Value) -> Value {
        let Some(url) = self.endpoint("auth/register") else {
            return failure(INVALID_PATH);
        };
        match self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                match response.json::<Value>().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(status = status.as_u16(), error = %e, "Register response is not JSON");
                        failure("Invalid response from server")
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Backend register request failed");
                failure(UNREACHABLE)
            }
        }
    }

    /// Call an authenticated backend endpoint with the user's backend token.
    ///
    /// Produces `{ success: true, ...body }` on a 2xx status and
    /// `{ success: false, error }` otherwise.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> (StatusCode, Value) {
        let Some(url) = self.endpoint(path) else {
            warn!(%method, path, "Backend path escapes the API base");
            return (StatusCode::BAD_REQUEST, failure(INVALID_PATH));
        };
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, path, error = %e, "Backend call failed");
                return (StatusCode::BAD_GATEWAY, failure(UNREACHABLE));
            }
        };

        let status = response.status();
        let data = response.json::<Value>().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return (status, failure(error_message(&data)));
        }

        let mut envelope = Map::new();
        envelope.insert("success".into(), Value::Bool(true));
        match data {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if key != "success" {
                        envelope.insert(key, value);
                    }
                }
            }
            Value::Null => {}
            other => {
                envelope.insert("data".into(), other);
            }
        }
        (status, Value::Object(envelope))
    }
}

/// Human-readable message from a backend error body.
fn error_message(data: &Value) -> &str {
    data.get("message")
        .and_then(Value::as_str)
        .or_else(|| data.get("error").and_then(Value::as_str))
        .unwrap_or("Request failed")
}

fn failure(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

fn identity_from_envelope(envelope: LoginEnvelope, identifier: &str) -> Option<Identity> {
    if !envelope.success {
        return None;
    }

    match envelope.data {
        Value::String(token) => {
            let preview = decode_token_preview(&token)
                .inspect_err(|e| warn!(error = %e, "Backend token payload unreadable"))
                .ok()?;
            Some(Identity {
                id: preview.user_id,
                name: preview.sub.clone(),
                email: preview.sub,
                role: preview.role,
                token,
            })
        }
        data @ Value::Object(_) => {
            let user: LoginUser = serde_json::from_value(data)
                .inspect_err(|e| warn!(error = %e, "Backend user object unreadable"))
                .ok()?;
            let token = user
                .access_token
                .filter(|t| !t.is_empty())
                .or(user.token.filter(|t| !t.is_empty()))?;
            Some(Identity {
                id: user.id,
                name: user.full_name.unwrap_or_else(|| identifier.to_string()),
                email: user.email.unwrap_or_default(),
                role: user.role,
                token,
            })
        }
        _ => None,
    }
}
