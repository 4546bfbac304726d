//! Client IP extraction.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::HeaderName};

/// Where the client address comes from.
#[derive(Debug, Clone, Default)]
pub enum ClientIpSource {
    /// Peer address of the TCP connection.
    #[default]
    Socket,
    /// First address in a header set by a trusted reverse proxy.
    Header(HeaderName),
}

/// Access to the headers and extensions of an incoming request.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl<B> HasHeadersAndExtensions for axum::http::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::http::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::http::Request::extensions(self)
    }
}

/// Extract the client IP address.
///
/// With a header source, a missing or unparseable header is an error; there
/// is no fallback to the socket address, which would be the proxy's.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    ip_source: &ClientIpSource,
) -> Result<String, &'static str> {
    match ip_source {
        ClientIpSource::Header(name) => {
            let value = source
                .headers()
                .get(name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            let first = value.split(',').next().unwrap_or("").trim();
            first
                .parse::<IpAddr>()
                .map(|ip| ip.to_string())
                .map_err(|_| "IP header does not contain an IP address")
        }
        ClientIpSource::Socket => source
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
