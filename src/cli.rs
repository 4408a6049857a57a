//! CLI argument parsing, validation, and startup helpers.

use std::path::Path;
use std::time::Duration;

use axum::http::HeaderName;
use clap::Parser;
use tracing::{error, info};
use url::Url;

use crate::auth::{
    ACCESS_COOKIE_MAX_AGE, CookieSettings, DEFAULT_API_PREFIXES, DEFAULT_PUBLIC_ROUTES,
    JwtResolver, REFRESH_COOKIE_MAX_AGE, RemoteResolver, SESSION_TOKEN_DURATION_SECS,
    SessionCookieResolver,
};
use crate::identity::HttpIdentityClient;
use crate::token::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS, TokenCodec};
use crate::{ServerConfig, Strategy};

const MIN_SECRET_LENGTH: usize = 32;

/// Longest accepted token or cookie lifetime (ten years).
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub const ACCESS_SECRET_ENV: &str = "JWT_ACCESS_SECRET";
pub const REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrategyKind {
    /// Access and refresh JWTs signed by this server
    #[default]
    Jwt,
    /// A single signed session cookie
    Session,
    /// Tokens issued by a remote identity service
    Remote,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gatehouse",
    about = "Cookie based authentication gate with token rotation"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Authentication strategy
    #[arg(short, long, value_enum, default_value = "jwt")]
    pub strategy: StrategyKind,

    /// Path to file containing the access token secret. Prefer JWT_ACCESS_SECRET
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer JWT_REFRESH_SECRET
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Path to file containing the session secret. Prefer SESSION_SECRET
    #[arg(long)]
    pub session_secret_file: Option<String>,

    /// Base URL of the identity service (remote strategy)
    #[arg(long, env = "IDENTITY_API_URL")]
    pub identity_url: Option<Url>,

    /// Timeout for a single identity service call, in milliseconds
    #[arg(long, default_value = "5000")]
    pub identity_timeout_ms: u64,

    /// Production mode: Secure cookies and https redirects
    #[arg(long, env = "PRODUCTION")]
    pub production: bool,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS)]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS)]
    pub refresh_ttl: u64,

    /// Session lifetime in seconds (session strategy)
    #[arg(long, default_value_t = SESSION_TOKEN_DURATION_SECS)]
    pub session_ttl: u64,

    /// Access cookie Max-Age in seconds
    #[arg(long, default_value_t = ACCESS_COOKIE_MAX_AGE)]
    pub access_cookie_max_age: u64,

    /// Refresh cookie Max-Age in seconds
    #[arg(long, default_value_t = REFRESH_COOKIE_MAX_AGE)]
    pub refresh_cookie_max_age: u64,

    /// Path reachable without credentials (repeatable)
    #[arg(long = "public-route", value_parser = validate_route,
        default_values_t = DEFAULT_PUBLIC_ROUTES.iter().map(|r| r.to_string()))]
    pub public_routes: Vec<String>,

    /// Path prefix of API routes, refused with 401 JSON rather than redirected (repeatable)
    #[arg(long = "api-prefix", value_parser = validate_route,
        default_values_t = DEFAULT_API_PREFIXES.iter().map(|r| r.to_string()))]
    pub api_prefixes: Vec<String>,

    /// Header carrying the client IP, e.g. x-forwarded-for. Only set this behind a proxy
    #[arg(long, value_parser = parse_header_name)]
    pub client_ip_header: Option<HeaderName>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_route(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Route must start with '/': {}", s));
    }

    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Route contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

fn parse_header_name(s: &str) -> Result<HeaderName, String> {
    HeaderName::try_from(s).map_err(|e| format!("Invalid header name {}: {}", s, e))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a secret from environment variable `var` or from `file`.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(var: &str, file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(Path::new(path)) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            variable = var,
            "Secret is required. Set the environment variable (recommended) or pass the matching --*-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            variable = var,
            "Secret is shorter than {} characters. Use a longer secret", MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Check lifetimes are usable together.
pub fn check_lifetimes(args: &Args) -> Result<(), String> {
    if args.access_ttl == 0 || args.refresh_ttl == 0 || args.session_ttl == 0 {
        return Err("Token lifetimes must be positive".to_string());
    }

    let longest = [
        args.access_ttl,
        args.refresh_ttl,
        args.session_ttl,
        args.access_cookie_max_age,
        args.refresh_cookie_max_age,
    ]
    .into_iter()
    .max()
    .unwrap_or_default();
    if longest > MAX_LIFETIME_SECS {
        return Err(format!(
            "Lifetimes are capped at {}s, got {}s",
            MAX_LIFETIME_SECS, longest
        ));
    }

    if args.refresh_ttl <= args.access_ttl {
        return Err(format!(
            "Refresh token lifetime ({}s) must exceed access token lifetime ({}s)",
            args.refresh_ttl, args.access_ttl
        ));
    }

    // A refresh cookie dropped before the access cookie makes rotation impossible
    if args.refresh_cookie_max_age <= args.access_cookie_max_age {
        return Err(format!(
            "Refresh cookie max-age ({}s) must exceed access cookie max-age ({}s)",
            args.refresh_cookie_max_age, args.access_cookie_max_age
        ));
    }

    if args.identity_timeout_ms == 0 {
        return Err("Identity timeout must be positive".to_string());
    }

    Ok(())
}

fn build_strategy(args: &Args) -> Option<Strategy> {
    match args.strategy {
        StrategyKind::Jwt => {
            let access = load_secret(ACCESS_SECRET_ENV, args.access_secret_file.as_deref())?;
            let refresh = load_secret(REFRESH_SECRET_ENV, args.refresh_secret_file.as_deref())?;
            match TokenCodec::new(
                access.as_bytes(),
                refresh.as_bytes(),
                args.access_ttl,
                args.refresh_ttl,
            ) {
                Ok(codec) => Some(Strategy::Jwt(JwtResolver::new(codec))),
                Err(e) => {
                    error!(error = %e, "Invalid token configuration");
                    None
                }
            }
        }
        StrategyKind::Session => {
            let secret = load_secret(SESSION_SECRET_ENV, args.session_secret_file.as_deref())?;
            Some(Strategy::Session(SessionCookieResolver::new(
                secret.as_bytes(),
                args.session_ttl,
            )))
        }
        StrategyKind::Remote => {
            let Some(url) = args.identity_url.clone() else {
                error!("The remote strategy requires --identity-url or IDENTITY_API_URL");
                return None;
            };
            let timeout = Duration::from_millis(args.identity_timeout_ms);
            match HttpIdentityClient::new(url, timeout) {
                Ok(client) => {
                    info!(url = %client.base_url(), "Using remote identity service");
                    Some(Strategy::Remote(RemoteResolver::new(client, timeout)))
                }
                Err(e) => {
                    error!(error = %e, "Failed to create identity client");
                    None
                }
            }
        }
    }
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the configuration is unusable.
pub fn build_config(args: &Args) -> Option<ServerConfig> {
    if let Err(e) = check_lifetimes(args) {
        error!("{}", e);
        return None;
    }

    let strategy = build_strategy(args)?;

    let mut cookies = CookieSettings::new(args.production);
    cookies.access.max_age = args.access_cookie_max_age;
    cookies.refresh.max_age = args.refresh_cookie_max_age;
    cookies.session.max_age = args.session_ttl;

    Some(ServerConfig {
        strategy,
        cookies,
        public_routes: args.public_routes.clone(),
        api_prefixes: args.api_prefixes.clone(),
        client_ip_header: args.client_ip_header.clone(),
    })
}
