//! HTTP surface: login/logout endpoints and the protected pages.

use axum::{
    Extension, Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, Uri},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::auth::{
    ApiError, AuthContext, AuthState, AuthStatus, CredentialJar, CredentialKind, HOME_PATH,
    LOGIN_PATH, LoginError, LoginForm, Profile, SessionResolver, auth_gate, redirect_location,
};
use crate::rate_limit::{LoginRateLimit, rate_limit_login};

pub const LOGOUT_PATH: &str = "/logout";
pub const PROFILE_PATH: &str = "/profile";
pub const API_PROFILE_PATH: &str = "/api/profile";

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form method="post" action="/login">
<label>Username <input name="username" autocomplete="username" required></label>
<label>Password <input name="password" type="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

/// Build the application router for one authentication strategy.
///
/// Every route, including unknown ones, runs behind the auth gate.
pub fn router<R: SessionResolver>(state: AuthState<R>, rate_limit: LoginRateLimit) -> Router {
    let submit = post(login::<R>)
        .route_layer(middleware::from_fn_with_state(rate_limit, rate_limit_login));

    Router::new()
        .route(HOME_PATH, get(home))
        .route(PROFILE_PATH, get(profile::<R>))
        .route(API_PROFILE_PATH, get(profile::<R>))
        .route(LOGIN_PATH, get(login_page).merge(submit))
        .route(LOGOUT_PATH, post(logout::<R>))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), auth_gate::<R>))
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

async fn login<R: SessionResolver>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    uri: Uri,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(error = %rejection, "Unreadable login submission");
            return LoginError::missing_fields().into_response();
        }
    };

    let effects = match state.resolver.login(&form).await {
        Ok(effects) => effects,
        Err(e) => return e.into_response(),
    };

    info!(username = %form.username.trim(), "Login succeeded");

    let mut jar = CredentialJar::default();
    jar.apply(&state.cookies, &effects);

    let location = redirect_location(&headers, &uri, state.cookies.secure, HOME_PATH);
    let mut response = Redirect::to(&location).into_response();
    jar.write_to(&mut response);
    response
}

async fn logout<R: SessionResolver>(
    State(state): State<AuthState<R>>,
    context: Option<Extension<AuthContext>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let credentials = match context {
        Some(Extension(context)) => context.credentials,
        None => state.cookies.inbound(&CredentialJar::from_headers(&headers)),
    };

    let target = match state.resolver.logout(&credentials).await {
        Ok(()) => {
            info!("Logged out");
            LOGIN_PATH
        }
        Err(e) => {
            error!(error = %e, "Logout notification failed");
            HOME_PATH
        }
    };

    // Cleared no matter what the issuer said.
    let mut jar = CredentialJar::default();
    for kind in CredentialKind::ALL {
        jar.expire(state.cookies.name(kind), state.cookies.policy(kind));
    }

    let location = redirect_location(&headers, &uri, state.cookies.secure, target);
    let mut response = Redirect::to(&location).into_response();
    jar.write_to(&mut response);
    response
}

#[derive(Serialize)]
struct PageResponse {
    page: &'static str,
    status: AuthStatus,
    user: Option<Profile>,
}

async fn home(Extension(context): Extension<AuthContext>) -> Json<PageResponse> {
    Json(PageResponse {
        page: "home",
        status: context.status,
        user: context
            .identity
            .map(|identity| Profile::Local(identity.user())),
    })
}

/// The caller's profile, looked up by the active strategy.
async fn profile<R: SessionResolver>(
    State(state): State<AuthState<R>>,
    Extension(context): Extension<AuthContext>,
) -> Response {
    match state
        .resolver
        .profile(context.identity.as_ref(), &context.credentials)
        .await
    {
        Ok(user) => Json(PageResponse {
            page: "profile",
            status: context.status,
            user,
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Could not load profile");
            ApiError::from(e).into_response()
        }
    }
}
