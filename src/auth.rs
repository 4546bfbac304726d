//! Session-based authentication and role-scoped route guarding.
//!
//! The session lives in a signed cookie (see [`crate::session`]). The route
//! guard runs in front of every protected path, resolves the caller's role
//! and either lets the request through, sends it to the login page, or
//! bounces it to the caller's own area. Handlers read the session through
//! the [`Session`] and [`MaybeSession`] extractors.

mod cookie;
mod errors;
mod extractors;
mod guard;
mod ip;
mod state;

pub use cookie::{SESSION_COOKIE_NAME, clear_session_cookie, get_cookie, session_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{MaybeSession, Session, read_session};
pub use guard::{GuardDecision, GuardState, evaluate, is_protected, login_redirect, route_guard};
pub use ip::{ClientIpSource, HasHeadersAndExtensions, extract_client_ip};
pub use state::HasSessionBackend;
