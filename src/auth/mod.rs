//! Cookie based authentication with pluggable strategies.
//!
//! Three strategies resolve the credentials of a request: locally signed
//! access/refresh JWTs with rotation, a single sliding session cookie, or
//! tokens minted by a remote identity service. Resolvers only decide; the
//! cookie changes they ask for are applied by the gate.

mod cookie;
mod errors;
mod gateway;
mod ip;
mod local;
mod middleware;
mod resolver;
mod routes;
mod session;
mod state;

pub use cookie::{
    ACCESS_COOKIE_MAX_AGE, ACCESS_COOKIE_NAME, CookiePolicy, CookieSettings, CookieSpec,
    CredentialEffect, CredentialJar, CredentialKind, InboundCredentials, REFRESH_COOKIE_MAX_AGE,
    REFRESH_COOKIE_NAME, SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME,
};
pub use errors::{ApiError, AuthError, LoginError};
pub use gateway::{DEFAULT_IDENTITY_TIMEOUT, RemoteResolver};
pub use ip::extract_client_ip;
pub use local::JwtResolver;
pub use middleware::{
    AuthContext, Decision, HOME_PATH, LOGIN_PATH, auth_gate, decide, gate_redirect,
    redirect_location,
};
pub use resolver::{AuthStatus, LoginForm, Profile, Resolution, SessionResolver, demo_user};
pub use routes::{DEFAULT_API_PREFIXES, DEFAULT_PUBLIC_ROUTES, RouteClass, RouteTable};
pub use session::{SESSION_TOKEN_DURATION_SECS, SessionCookieResolver};
pub use state::AuthState;
