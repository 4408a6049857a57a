#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Request, Response, header},
};
use gatehouse::{
    ServerConfig, Strategy,
    auth::{
        CookieSettings, DEFAULT_API_PREFIXES, DEFAULT_PUBLIC_ROUTES, JwtResolver,
        SessionCookieResolver,
    },
    create_app,
    token::{TokenCodec, User, unix_now},
};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const SESSION_SECRET: &[u8] = b"test-session-secret-0123456789abcdef";

pub const ACCESS_TTL: u64 = 10;
pub const REFRESH_TTL: u64 = 30;

pub const TEST_IP: &str = "127.0.0.1";
pub const ALT_IP: &str = "192.168.1.100";
pub const TEST_HOST: &str = "localhost";

pub fn ip_header() -> HeaderName {
    HeaderName::from_static("x-forwarded-for")
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET, ACCESS_TTL, REFRESH_TTL).unwrap()
}

pub fn alice() -> User {
    User {
        id: "uuid-alice".to_string(),
        email: "alice@example.com".to_string(),
        name: "Alice".to_string(),
    }
}

pub fn now() -> u64 {
    unix_now().unwrap()
}

pub fn config(strategy: Strategy) -> ServerConfig {
    ServerConfig {
        strategy,
        cookies: CookieSettings::new(false),
        public_routes: DEFAULT_PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
        api_prefixes: DEFAULT_API_PREFIXES.iter().map(|r| r.to_string()).collect(),
        client_ip_header: Some(ip_header()),
    }
}

pub fn jwt_app() -> Router {
    create_app(config(Strategy::Jwt(JwtResolver::new(codec()))))
}

pub fn session_app() -> Router {
    create_app(config(Strategy::Session(SessionCookieResolver::new(
        SESSION_SECRET,
        3600,
    ))))
}

pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(path)
        .header(header::HOST, TEST_HOST)
        .header("x-forwarded-for", TEST_IP);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(path: &str, form: &str, cookie: Option<&str>, ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::HOST, TEST_HOST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", ip);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain `name` being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", name)) && c.contains("Max-Age=0"))
}

/// Value of a cookie being set (not cleared)
pub fn set_cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies
        .iter()
        .filter(|c| !c.contains("Max-Age=0"))
        .find_map(|c| c.strip_prefix(&format!("{}=", name)))
        .and_then(|rest| rest.split(';').next())
        .map(|v| v.to_string())
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Path of the Location header, for following a redirect with `get`.
pub fn location_path(response: &Response<Body>) -> String {
    let location = location(response);
    url::Url::parse(location)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| location.to_string())
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
