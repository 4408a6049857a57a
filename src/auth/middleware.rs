//! The auth gate: every request is classified and resolved before any handler
//! runs, then allowed through or redirected.
//!
//! | route     | caller          | decision          |
//! |-----------|-----------------|-------------------|
//! | public    | unauthenticated | proceed           |
//! | public    | authenticated   | redirect to home  |
//! | protected | unauthenticated | redirect to login |
//! | protected | authenticated   | proceed           |
//! | api       | unauthenticated | 401 JSON          |
//! | api       | authenticated   | proceed           |

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;
use url::Url;

use super::cookie::{CredentialJar, InboundCredentials};
use super::errors::ApiError;
use super::resolver::{AuthStatus, SessionResolver};
use super::routes::RouteClass;
use super::state::AuthState;
use crate::token::IdentityPayload;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    RedirectHome,
    RedirectLogin,
    Reject,
}

pub fn decide(class: RouteClass, status: AuthStatus) -> Decision {
    match (class, status.is_authenticated()) {
        (RouteClass::Public, false) => Decision::Proceed,
        (RouteClass::Public, true) => Decision::RedirectHome,
        (RouteClass::Protected, false) => Decision::RedirectLogin,
        (RouteClass::Protected, true) => Decision::Proceed,
        (RouteClass::Api, false) => Decision::Reject,
        (RouteClass::Api, true) => Decision::Proceed,
    }
}

/// Auth outcome made available to handlers as a request extension.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub status: AuthStatus,
    pub identity: Option<IdentityPayload>,
    /// Credentials as they stand after any rotation in this request
    pub credentials: InboundCredentials,
}

/// Absolute URL for `target` on the origin the request was sent to.
///
/// Falls back to the bare path when the request carries no host.
pub fn redirect_location(headers: &HeaderMap, uri: &Uri, secure: bool, target: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));

    let Some(host) = host else {
        return target.to_string();
    };

    let scheme = if secure { "https" } else { "http" };
    Url::parse(&format!("{}://{}", scheme, host))
        .and_then(|origin| origin.join(target))
        .map(String::from)
        .unwrap_or_else(|_| target.to_string())
}

/// Gate redirect that lands on a plain `GET` of the target.
///
/// Safe methods get 302; anything else gets 303 so the body is not replayed.
pub fn gate_redirect(method: &Method, location: &str) -> Response {
    if *method == Method::GET || *method == Method::HEAD {
        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    } else {
        Redirect::to(location).into_response()
    }
}

/// Middleware gating every route. Install with `from_fn_with_state`.
pub async fn auth_gate<R: SessionResolver>(
    State(state): State<AuthState<R>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = state.routes.classify(&path);

    let mut jar = CredentialJar::from_headers(request.headers());
    let inbound = state.cookies.inbound(&jar);

    let resolution = state.resolver.resolve(&inbound).await;
    jar.apply(&state.cookies, &resolution.effects);

    let decision = decide(class, resolution.status);
    let mut response = match decision {
        Decision::Proceed => {
            let credentials = state.cookies.inbound(&jar);
            request.extensions_mut().insert(AuthContext {
                status: resolution.status,
                identity: resolution.identity,
                credentials,
            });
            next.run(request).await
        }
        Decision::Reject => {
            debug!(path = %path, status = ?resolution.status, "Rejecting API request");
            ApiError::unauthorized().into_response()
        }
        Decision::RedirectHome | Decision::RedirectLogin => {
            let target = if decision == Decision::RedirectHome {
                HOME_PATH
            } else {
                LOGIN_PATH
            };
            debug!(path = %path, status = ?resolution.status, target = %target, "Redirecting");
            let location =
                redirect_location(request.headers(), request.uri(), state.cookies.secure, target);
            gate_redirect(request.method(), &location)
        }
    };

    jar.write_to(&mut response);
    response
}
