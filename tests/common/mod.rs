#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rentgate::auth::{ClientIpSource, SESSION_COOKIE_NAME};
use rentgate::backend::Identity;
use rentgate::rate_limit::LoginRateSettings;
use rentgate::roles::Role;
use rentgate::session::SessionConfig;
use rentgate::{ServerConfig, create_app};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

pub const SECRET: &[u8] = b"integration-test-session-secret-0123456789";

/// Password accepted by the mock backend for every known account.
pub const PASSWORD: &str = "correct-horse";

/// Build an unsigned-for-our-purposes backend token with the given payload.
pub fn backend_token(sub: &str, user_id: &str, role: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "sub": sub, "userId": user_id, "role": role })
            .to_string()
            .as_bytes(),
    );
    format!("{}.{}.backend-signature", header, payload)
}

async fn mock_login(Json(body): Json<Value>) -> Response {
    let identifier = body["emailOrPhonenumber"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid credentials" })),
        )
            .into_response();
    }

    let data = match identifier {
        "admin@x.com" => json!(backend_token("admin@x.com", "1", "ADMIN")),
        "owner@x.com" => json!(backend_token("owner@x.com", "2", "HOUSEOWNER")),
        "renter@x.com" => json!(backend_token("renter@x.com", "3", "RENTER")),
        "mystery@x.com" => json!(backend_token("mystery@x.com", "4", "CARETAKER")),
        "broken@x.com" => json!("this-is-not-a-jwt"),
        "legacy@x.com" => json!({
            "id": 5,
            "fullName": "Lena Legacy",
            "email": "legacy@x.com",
            "role": "HOUSEOWNER",
            "accessToken": "legacy.backend.token"
        }),
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "message": "Invalid credentials" })),
            )
                .into_response();
        }
    };

    Json(json!({ "success": true, "data": data })).into_response()
}

async fn mock_register(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "success": true, "data": { "email": body["email"] } }))
}

async fn mock_properties(headers: HeaderMap) -> Response {
    match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(auth) if auth.starts_with("Bearer ") => Json(json!({
            "data": [{ "id": 1, "name": "Lake View" }],
            "seenAuthorization": auth,
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Missing token" })),
        )
            .into_response(),
    }
}

/// Start the mock backend and return its API base URL.
pub async fn spawn_backend() -> Url {
    let app = Router::new()
        .route("/api/v1/auth/login", post(mock_login))
        .route("/api/v1/auth/register", post(mock_register))
        .route("/api/v1/property", get(mock_properties));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock backend");
    let addr = listener.local_addr().expect("Failed to get local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Url::parse(&format!("http://{}/api/v1", addr)).expect("Invalid URL")
}

/// A backend URL nothing listens on.
pub fn unreachable_backend() -> Url {
    Url::parse("http://127.0.0.1:1/api/v1").expect("Invalid URL")
}

pub fn config(api_base: Url) -> ServerConfig {
    ServerConfig {
        session_secret: SECRET.to_vec(),
        api_base,
        secure_cookies: false,
        session_max_age: 3600,
        session_update_age: 600,
        backend_timeout: Duration::from_secs(5),
        ip_source: ClientIpSource::Socket,
        login_rate: LoginRateSettings {
            per_minute: NonZeroU32::new(600).unwrap(),
            burst: NonZeroU32::new(100).unwrap(),
        },
    }
}

pub async fn app_with_backend() -> Router {
    create_app(&config(spawn_backend().await)).expect("Failed to create app")
}

pub fn app_without_backend() -> Router {
    create_app(&config(unreachable_backend())).expect("Failed to create app")
}

pub fn sessions() -> SessionConfig {
    SessionConfig::with_lifetimes(SECRET, 3600, 600)
}

/// Cookie header value for a freshly issued session.
pub fn session_cookie_for(role: Option<Role>) -> String {
    let identity = Identity {
        id: "42".to_string(),
        name: "Test User".to_string(),
        email: "user@x.com".to_string(),
        role,
        token: backend_token("user@x.com", "42", role.map(|r| r.as_str()).unwrap_or("")),
    };
    let issued = sessions().issue(&identity).expect("Failed to issue session");
    format!("{}={}", SESSION_COOKIE_NAME, issued.token)
}

/// Attach a peer address so IP-based rate limiting can identify the client.
pub fn with_peer(mut request: Request<Body>) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    request
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_login(username: &str, password: &str, callback: Option<&str>) -> Request<Body> {
    let mut body = json!({ "username": username, "password": password });
    if let Some(callback) = callback {
        body["callbackUrl"] = json!(callback);
    }
    with_peer(
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Missing Location header")
        .to_str()
        .unwrap()
}

/// The `name=value` pair of the session cookie set by a response, if any.
pub fn set_session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", SESSION_COOKIE_NAME)))
        .and_then(|v| v.split(';').next())
        .map(|v| v.to_string())
}
