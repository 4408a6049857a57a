//! Single sliding session cookie strategy.

mod common;

use axum::http::StatusCode;
use common::*;
use gatehouse::{
    auth::SessionCookieResolver,
    token::{TokenClass, TokenKey},
};
use tower::ServiceExt;

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = session_app();

    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            "username=dave&password=pw",
            None,
            TEST_IP,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookies = extract_set_cookies(&response);
    let session = set_cookie_value(&cookies, "session").expect("session cookie");
    assert!(set_cookie_value(&cookies, "access_token").is_none());
    assert!(set_cookie_value(&cookies, "refresh_token").is_none());

    let response = app
        .oneshot(get("/profile", Some(&format!("session={}", session))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "authenticated");
    assert_eq!(json["user"]["name"], "dave");
}

#[tokio::test]
async fn test_session_renewed_on_every_request() {
    let resolver = SessionCookieResolver::new(SESSION_SECRET, 3600);
    let issued = resolver.key().issue_at(&alice(), now() - 1800).unwrap();

    let response = session_app()
        .oneshot(get("/", Some(&format!("session={}", issued.token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = extract_set_cookies(&response);
    let renewed = set_cookie_value(&cookies, "session").expect("renewed session");
    assert!(cookies.iter().any(|c| c.contains("Max-Age=3600")));

    let claims = resolver.key().verify(&renewed).unwrap();
    assert!(claims.exp > issued.expires_at);
}

#[tokio::test]
async fn test_expired_session_cleared() {
    let resolver = SessionCookieResolver::new(SESSION_SECRET, 3600);
    let issued = resolver.key().issue_at(&alice(), now() - 3600).unwrap();

    let response = session_app()
        .oneshot(get("/profile", Some(&format!("session={}", issued.token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "http://localhost/login");
    assert!(has_cleared_cookie(&extract_set_cookies(&response), "session"));
}

#[tokio::test]
async fn test_access_token_is_not_a_session() {
    // Same secret, different token class
    let key = TokenKey::new(TokenClass::Access, SESSION_SECRET, 3600);
    let token = key.issue(&alice()).unwrap().token;

    let response = session_app()
        .oneshot(get("/profile", Some(&format!("session={}", token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_jwt_cookies_ignored_by_session_strategy() {
    let pair = codec().issue_pair(&alice()).unwrap();
    let cookie = format!(
        "access_token={}; refresh_token={}",
        pair.access.token, pair.refresh.token
    );

    let response = session_app()
        .oneshot(get("/profile", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let resolver = SessionCookieResolver::new(SESSION_SECRET, 3600);
    let issued = resolver.key().issue(&alice()).unwrap();

    let response = session_app()
        .oneshot(post_form(
            "/logout",
            "",
            Some(&format!("session={}", issued.token)),
            TEST_IP,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "http://localhost/login");

    let cookies = extract_set_cookies(&response);
    assert!(has_cleared_cookie(&cookies, "session"));
    assert!(set_cookie_value(&cookies, "session").is_none());
}
