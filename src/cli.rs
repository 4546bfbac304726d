//! CLI argument parsing, configuration validation, and startup helpers.
//!
//! Configuration problems are reported before the listener is bound; there
//! are no built-in fallbacks for the session secret or the backend URL.

use crate::ServerConfig;
use crate::auth::ClientIpSource;
use crate::rate_limit::LoginRateSettings;
use crate::session::MAX_SESSION_AGE_SECS;
use axum::http::HeaderName;
use clap::Parser;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::warn;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Secrets that have shipped as defaults and must never be used.
const KNOWN_INSECURE_SECRETS: &[&str] = &["super-secret-key", "secret", "changeme"];

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rentgate",
    about = "Session and role gateway for the property management client"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    pub port: u16,

    /// Base URL of the backend API (e.g. "https://api.example.com/api/v1")
    #[arg(long, env = "API_URL")]
    pub api_url: String,

    /// Path to file containing the session secret. Prefer the SESSION_SECRET env var
    #[arg(long)]
    pub session_secret_file: Option<String>,

    /// Set the Secure flag on session cookies (required when served over HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Session lifetime in seconds
    #[arg(long, default_value_t = crate::session::DEFAULT_MAX_AGE_SECS)]
    pub session_max_age: u64,

    /// Re-sign sessions older than this many seconds
    #[arg(long, default_value_t = crate::session::DEFAULT_UPDATE_AGE_SECS)]
    pub session_update_age: u64,

    /// Timeout for backend requests in seconds
    #[arg(long, default_value_t = crate::backend::DEFAULT_TIMEOUT.as_secs())]
    pub backend_timeout: u64,

    /// Take the client IP from this header (e.g. x-forwarded-for) when behind a proxy
    #[arg(long)]
    pub ip_header: Option<String>,

    /// Sustained login attempts allowed per minute per IP
    #[arg(long, default_value = "10")]
    pub login_rate_per_minute: NonZeroU32,

    /// Login attempts allowed in a burst per IP
    #[arg(long, default_value = "5")]
    pub login_burst: NonZeroU32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Configuration defects found at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "session secret is required. Set SESSION_SECRET environment variable (recommended) or use --session-secret-file"
    )]
    MissingSecret,
    #[error("failed to read session secret file {path}: {source}")]
    SecretFile {
        path: String,
        source: std::io::Error,
    },
    #[error("session secret is shorter than 32 characters")]
    SecretTooShort,
    #[error("session secret is a well-known default; generate a random one")]
    InsecureSecret,
    #[error("invalid API URL {url}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("invalid IP header name: {0}")]
    InvalidIpHeader(String),
    #[error("session update age must be shorter than the session lifetime")]
    InvalidSessionAges,
    #[error("session lifetime must be between 1 and {max} seconds")]
    SessionMaxAgeOutOfRange { max: u64 },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the session secret from the environment or a file.
pub fn load_session_secret(secret_file: Option<&str>) -> Result<String, ConfigError> {
    let secret = if let Ok(secret) = std::env::var("SESSION_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("SESSION_SECRET") };
        secret
    } else if let Some(path) = secret_file {
        std::fs::read_to_string(path)
            .map_err(|source| ConfigError::SecretFile {
                path: path.to_string(),
                source,
            })?
            .trim()
            .to_string()
    } else {
        return Err(ConfigError::MissingSecret);
    };

    validate_session_secret(secret)
}

/// Reject empty, short, and known default secrets.
pub fn validate_session_secret(secret: String) -> Result<String, ConfigError> {
    if secret.trim().is_empty() {
        return Err(ConfigError::MissingSecret);
    }

    let normalized = secret.trim().to_ascii_lowercase();
    if KNOWN_INSECURE_SECRETS.contains(&normalized.as_str()) {
        return Err(ConfigError::InsecureSecret);
    }

    if secret.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::SecretTooShort);
    }

    Ok(secret)
}

/// Parse and validate the backend base URL.
pub fn validate_api_url(api_url: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidApiUrl {
        url: api_url.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(api_url).map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not contain a query or fragment"));
    }

    let is_local = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    if url.scheme() == "http" && !is_local {
        warn!(url = %url, "Backend API is not using HTTPS; backend tokens travel in cleartext");
    }

    Ok(url)
}

/// Turn the optional `--ip-header` value into an IP source.
pub fn parse_ip_source(ip_header: Option<&str>) -> Result<ClientIpSource, ConfigError> {
    match ip_header {
        None => Ok(ClientIpSource::Socket),
        Some(name) => HeaderName::from_bytes(name.trim().to_ascii_lowercase().as_bytes())
            .map(ClientIpSource::Header)
            .map_err(|_| ConfigError::InvalidIpHeader(name.to_string())),
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, session_secret: String) -> Result<ServerConfig, ConfigError> {
    let api_base = validate_api_url(&args.api_url)?;
    let ip_source = parse_ip_source(args.ip_header.as_deref())?;

    if args.session_max_age == 0 || args.session_max_age > MAX_SESSION_AGE_SECS {
        return Err(ConfigError::SessionMaxAgeOutOfRange {
            max: MAX_SESSION_AGE_SECS,
        });
    }
    if args.session_update_age >= args.session_max_age {
        return Err(ConfigError::InvalidSessionAges);
    }

    Ok(ServerConfig {
        session_secret: session_secret.into_bytes(),
        api_base,
        secure_cookies: args.secure_cookies,
        session_max_age: args.session_max_age,
        session_update_age: args.session_update_age,
        backend_timeout: Duration::from_secs(args.backend_timeout),
        ip_source,
        login_rate: LoginRateSettings {
            per_minute: args.login_rate_per_minute,
            burst: args.login_burst,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["rentgate", "--api-url", "http://localhost:8080/api/v1"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_secret_rules() {
        assert!(matches!(
            validate_session_secret(String::new()),
            Err(ConfigError::MissingSecret)
        ));
        assert!(matches!(
            validate_session_secret("super-secret-key".to_string()),
            Err(ConfigError::InsecureSecret)
        ));
        assert!(matches!(
            validate_session_secret("short".to_string()),
            Err(ConfigError::SecretTooShort)
        ));
        let good = "k".repeat(MIN_SESSION_SECRET_LENGTH);
        assert_eq!(validate_session_secret(good.clone()).unwrap(), good);
    }

    #[test]
    fn test_api_url_rules() {
        assert_eq!(
            validate_api_url("https://api.example.com/api/v1")
                .unwrap()
                .path(),
            "/api/v1"
        );
        assert!(validate_api_url("http://localhost:8080/api/v1").is_ok());
        assert!(validate_api_url("ftp://api.example.com").is_err());
        assert!(validate_api_url("not a url").is_err());
        assert!(validate_api_url("https://api.example.com/?x=1").is_err());
    }

    #[test]
    fn test_ip_source() {
        assert!(matches!(parse_ip_source(None), Ok(ClientIpSource::Socket)));
        match parse_ip_source(Some("X-Forwarded-For")) {
            Ok(ClientIpSource::Header(name)) => assert_eq!(name.as_str(), "x-forwarded-for"),
            _ => panic!("expected header source"),
        }
        assert!(parse_ip_source(Some("bad header")).is_err());
    }

    #[test]
    fn test_build_config_defaults() {
        let config = build_config(&args(&[]), "s".repeat(40)).unwrap();
        assert_eq!(config.api_base.as_str(), "http://localhost:8080/api/v1");
        assert!(!config.secure_cookies);
        assert_eq!(config.backend_timeout, Duration::from_secs(10));
        assert_eq!(config.login_rate, LoginRateSettings::default());
    }

    #[test]
    fn test_build_config_rejects_inverted_ages() {
        let parsed = args(&["--session-max-age", "60", "--session-update-age", "120"]);
        assert!(matches!(
            build_config(&parsed, "s".repeat(40)),
            Err(ConfigError::InvalidSessionAges)
        ));
    }

    #[test]
    fn test_build_config_rejects_unbounded_lifetime() {
        let parsed = args(&["--session-max-age", "18446744073709551615"]);
        assert!(matches!(
            build_config(&parsed, "s".repeat(40)),
            Err(ConfigError::SessionMaxAgeOutOfRange { .. })
        ));

        let year = MAX_SESSION_AGE_SECS.to_string();
        let parsed = args(&["--session-max-age", &year]);
        let config = build_config(&parsed, "s".repeat(40)).unwrap();
        assert_eq!(config.session_max_age, MAX_SESSION_AGE_SECS);
    }
}
