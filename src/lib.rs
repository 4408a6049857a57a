pub mod api;
pub mod auth;
pub mod cli;
pub mod identity;
pub mod rate_limit;
pub mod token;

use auth::{
    AuthState, CookieSettings, JwtResolver, RemoteResolver, RouteTable, SessionCookieResolver,
    SessionResolver,
};
use axum::{Router, http::HeaderName};
use identity::HttpIdentityClient;
use rate_limit::LoginRateLimit;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// User agent sent to the identity service.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Authentication strategy, fixed at startup.
pub enum Strategy {
    /// Locally signed access/refresh tokens with rotation
    Jwt(JwtResolver),
    /// One signed session cookie with sliding expiry
    Session(SessionCookieResolver),
    /// Tokens minted and rotated by a remote identity service
    Remote(RemoteResolver<HttpIdentityClient>),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Jwt(_) => "jwt",
            Strategy::Session(_) => "session",
            Strategy::Remote(_) => "remote",
        }
    }
}

pub struct ServerConfig {
    pub strategy: Strategy,
    /// Cookie names, lifetimes and the Secure flag
    pub cookies: CookieSettings,
    /// Paths reachable without credentials; everything else is protected
    pub public_routes: Vec<String>,
    /// Path prefixes answered with 401 JSON instead of a login redirect
    pub api_prefixes: Vec<String>,
    /// Header carrying the client IP when running behind a proxy
    pub client_ip_header: Option<HeaderName>,
}

fn build_router<R: SessionResolver>(
    resolver: R,
    routes: RouteTable,
    cookies: CookieSettings,
    rate_limit: LoginRateLimit,
) -> Router {
    api::router(AuthState::new(resolver, routes, cookies), rate_limit)
}

/// Create the application router with the given configuration.
pub fn create_app(config: ServerConfig) -> Router {
    let routes = RouteTable::new(config.public_routes).with_api_prefixes(config.api_prefixes);
    let rate_limit = LoginRateLimit::new(config.client_ip_header);
    let cookies = config.cookies;

    match config.strategy {
        Strategy::Jwt(resolver) => build_router(resolver, routes, cookies, rate_limit),
        Strategy::Session(resolver) => build_router(resolver, routes, cookies, rate_limit),
        Strategy::Remote(resolver) => build_router(resolver, routes, cookies, rate_limit),
    }
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
