mod common;

use axum::http::{StatusCode, header};
use common::{
    SECRET, app_without_backend, get_request, json_body, location, send, session_cookie_for,
    set_session_cookie,
};
use jsonwebtoken::{EncodingKey, Header};
use rentgate::auth::SESSION_COOKIE_NAME;
use rentgate::roles::Role;
use rentgate::session::{SessionClaims, unix_now};

fn signed_cookie(claims: &SessionClaims, secret: &[u8]) -> String {
    let token =
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
            .unwrap();
    format!("{}={}", SESSION_COOKIE_NAME, token)
}

fn claims_aged(role: Option<Role>, age: u64, lifetime: u64) -> SessionClaims {
    let now = unix_now().unwrap();
    SessionClaims {
        sub: "42".to_string(),
        name: "Test User".to_string(),
        email: "user@x.com".to_string(),
        role,
        access_token: "backend.token.sig".to_string(),
        iat: now - age,
        exp: now - age + lifetime,
    }
}

#[tokio::test]
async fn test_no_session_redirects_to_login_with_callback() {
    let app = app_without_backend();

    for path in [
        "/dashboard",
        "/admin/dashboard",
        "/owner/properties/7",
        "/renter/dashboard",
    ] {
        let response = send(&app, get_request(path, None)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{}", path);
        let expected = format!("/login?callbackUrl={}", path.replace('/', "%2F"));
        assert_eq!(location(&response), expected);
    }
}

#[tokio::test]
async fn test_each_role_reaches_own_area() {
    let app = app_without_backend();

    for (role, path, area) in [
        (Role::Admin, "/admin/dashboard", "admin"),
        (Role::HouseOwner, "/owner/dashboard", "owner"),
        (Role::Renter, "/renter/dashboard", "renter"),
    ] {
        let cookie = session_cookie_for(Some(role));
        let response = send(&app, get_request(path, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", path);

        let json = json_body(response).await;
        assert_eq!(json["area"], area);
        assert_eq!(json["path"], path);
        assert_eq!(json["role"], role.as_str());
        assert_eq!(json["user"]["id"], "42");
    }
}

#[tokio::test]
async fn test_generic_dashboard_dispatches_by_role() {
    let app = app_without_backend();

    for (role, expected) in [
        (Role::Renter, "/renter/dashboard"),
        (Role::HouseOwner, "/owner/dashboard"),
        (Role::Admin, "/admin/dashboard"),
    ] {
        let cookie = session_cookie_for(Some(role));
        let response = send(&app, get_request("/dashboard", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), expected);
    }
}

#[tokio::test]
async fn test_admin_may_enter_other_areas() {
    let app = app_without_backend();
    let cookie = session_cookie_for(Some(Role::Admin));

    for path in ["/renter/dashboard", "/owner/properties"] {
        let response = send(&app, get_request(path, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
    }
}

#[tokio::test]
async fn test_foreign_area_bounces_to_own_home() {
    let app = app_without_backend();

    let cases = [
        (Role::HouseOwner, "/admin/settings", "/owner/dashboard"),
        (Role::HouseOwner, "/renter/dashboard", "/owner/dashboard"),
        (Role::Renter, "/owner/properties/3", "/renter/dashboard"),
        (Role::Renter, "/admin", "/renter/dashboard"),
    ];

    for (role, path, expected) in cases {
        let cookie = session_cookie_for(Some(role));
        let response = send(&app, get_request(path, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{}", path);
        assert_eq!(location(&response), expected);
    }
}

#[tokio::test]
async fn test_session_without_known_role_is_treated_as_renter() {
    let app = app_without_backend();
    let cookie = session_cookie_for(None);

    let response = send(&app, get_request("/admin/dashboard", Some(&cookie))).await;
    assert_eq!(location(&response), "/renter/dashboard");

    let response = send(&app, get_request("/renter/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["role"], "RENTER");
}

#[tokio::test]
async fn test_tampered_session_fails_closed() {
    let app = app_without_backend();

    let forged = signed_cookie(
        &claims_aged(Some(Role::Admin), 0, 3600),
        b"some-other-secret-that-is-long-enough",
    );
    let response = send(&app, get_request("/admin/dashboard", Some(&forged))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("/login?callbackUrl="));

    let garbage = format!("{}=not.a.session", SESSION_COOKIE_NAME);
    let response = send(&app, get_request("/renter/dashboard", Some(&garbage))).await;
    assert!(location(&response).starts_with("/login?callbackUrl="));
}

#[tokio::test]
async fn test_expired_session_fails_closed() {
    let app = app_without_backend();
    let expired = signed_cookie(&claims_aged(Some(Role::Renter), 7200, 3600), SECRET);

    let response = send(&app, get_request("/renter/dashboard", Some(&expired))).await;
    assert_eq!(
        location(&response),
        "/login?callbackUrl=%2Frenter%2Fdashboard"
    );
}

#[tokio::test]
async fn test_public_paths_skip_guard() {
    let app = app_without_backend();

    let response = send(&app, get_request("/", None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");

    let response = send(&app, get_request("/login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request("/administrator", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_old_session_is_rolled() {
    let app = app_without_backend();
    let old = signed_cookie(&claims_aged(Some(Role::HouseOwner), 1200, 3600), SECRET);

    let response = send(&app, get_request("/owner/dashboard", Some(&old))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let rolled = set_session_cookie(&response).expect("Expected a rolled session cookie");
    assert_ne!(rolled, old);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("Max-Age=3600"));
    assert!(set_cookie.contains("HttpOnly"));

    // The rolled cookie works on its own
    let response = send(&app, get_request("/owner/dashboard", Some(&rolled))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_fresh_session_is_not_rolled() {
    let app = app_without_backend();
    let cookie = session_cookie_for(Some(Role::Renter));

    let response = send(&app, get_request("/renter/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_redirects_never_touch_the_cookie() {
    let app = app_without_backend();
    let cookie = session_cookie_for(Some(Role::Renter));

    let response = send(&app, get_request("/admin/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}
