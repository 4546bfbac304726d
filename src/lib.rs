pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod pages;
pub mod rate_limit;
pub mod roles;
pub mod session;

use api::create_api_router;
use auth::{ClientIpSource, GuardState, route_guard};
use axum::{Router, middleware};
use backend::BackendClient;
use cli::ConfigError;
use pages::PagesState;
use rate_limit::{LoginRateLimit, LoginRateSettings};
use session::SessionConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Secret for signing session tokens
    pub session_secret: Vec<u8>,
    /// Base URL of the backend API
    pub api_base: Url,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Session lifetime in seconds
    pub session_max_age: u64,
    /// Sessions older than this (seconds) are re-signed on the next guarded request
    pub session_update_age: u64,
    /// Timeout for each backend request
    pub backend_timeout: Duration,
    /// Where the client IP for rate limiting comes from
    pub ip_source: ClientIpSource,
    /// Login attempt limits per client IP
    pub login_rate: LoginRateSettings,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Result<Router, ConfigError> {
    let sessions = Arc::new(SessionConfig::with_lifetimes(
        &config.session_secret,
        config.session_max_age,
        config.session_update_age,
    ));

    let backend = BackendClient::new(config.api_base.clone(), config.backend_timeout)?;
    let rate_limit = LoginRateLimit::new(config.login_rate, config.ip_source.clone());

    let api_router = create_api_router(
        sessions.clone(),
        backend,
        config.secure_cookies,
        rate_limit,
    );

    let guard_state = GuardState {
        sessions: sessions.clone(),
        secure_cookies: config.secure_cookies,
    };

    // The guard sees every request and acts only on protected paths.
    Ok(Router::new()
        .nest("/api", api_router)
        .merge(pages::router(PagesState { sessions }))
        .layer(middleware::from_fn_with_state(guard_state, route_guard)))
}

/// Run the server on the given listener. This function blocks until the server exits.
///
/// Client addresses are attached to each request for login rate limiting.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
