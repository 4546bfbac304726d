//! Login page and area shells.
//!
//! Rendering of the property-management screens happens in the browser; the
//! gateway only serves the login form and a JSON shell for each area that
//! tells the client who is signed in and where it is.

use axum::{
    Json, Router,
    extract::Query,
    http::{Uri, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::safe_callback;
use crate::auth::{MaybeSession, Session};
use crate::impl_has_session_backend;
use crate::roles::{AREAS, Area, Role};
use crate::session::{SessionConfig, SessionUser};

#[derive(Clone)]
pub struct PagesState {
    pub sessions: Arc<SessionConfig>,
}

impl_has_session_backend!(PagesState);

pub fn router(state: PagesState) -> Router {
    let mut router = Router::new()
        .route("/", get(|| async { Redirect::temporary("/login") }))
        .route("/login", get(login_page))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/{*rest}", get(dashboard));

    for area in AREAS {
        router = router
            .route(area.prefix(), get(area_shell))
            .route(&format!("{}/{{*rest}}", area.prefix()), get(area_shell));
    }

    router.with_state(state)
}

#[derive(Deserialize)]
struct LoginQuery {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
    error: Option<String>,
}

const LOGIN_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<main>
<h1>Sign in</h1>
{error}<form method="post" action="/api/auth/login">
<input type="hidden" name="callbackUrl" value="{callback}">
<label>Email or phone <input name="username" autocomplete="username" required></label>
<label>Password <input name="password" type="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
</main>
</body>
</html>
"#;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serve the login form, sending signed-in users straight on.
async fn login_page(MaybeSession(session): MaybeSession, Query(query): Query<LoginQuery>) -> Response {
    let callback = safe_callback(query.callback_url.as_deref());

    if session.is_some() {
        return Redirect::temporary(&callback).into_response();
    }

    let error = if query.error.is_some() {
        "<p role=\"alert\">Invalid username or password</p>\n"
    } else {
        ""
    };
    let html = LOGIN_TEMPLATE
        .replace("{error}", error)
        .replace("{callback}", &escape_html(&callback));

    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        html,
    )
        .into_response()
}

/// Send the user to the dashboard of their own area.
async fn dashboard(Session(claims): Session) -> Redirect {
    Redirect::temporary(&claims.effective_role().home().dashboard_path())
}

#[derive(Serialize)]
struct AreaShell {
    area: &'static str,
    path: String,
    role: Role,
    user: SessionUser,
}

/// Area landing data. Only reachable through the route guard.
async fn area_shell(Session(claims): Session, uri: Uri) -> Json<AreaShell> {
    let path = uri.path().to_string();
    let role = claims.effective_role();
    let area = Area::of_path(&path).unwrap_or(role.home());

    Json(AreaShell {
        area: area.as_str(),
        path,
        role,
        user: claims.expose().user,
    })
}
