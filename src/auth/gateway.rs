//! Remote-backed strategy: credentials are minted by an identity service.
//!
//! Trust boundary: this process holds no key for the tokens it stores. Between
//! rotations an access token is accepted on presence and unexpired `exp` alone;
//! the identity service is only consulted to log in, rotate, log out and
//! fetch the caller's profile.
//! Every remote call is bounded by a timeout and never retried.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::cookie::{CredentialEffect, CredentialKind, InboundCredentials};
use super::errors::{AuthError, LoginError};
use super::resolver::{AuthStatus, LoginForm, Profile, Resolution, SessionResolver};
use crate::identity::{GatewayError, IdentityApi, LoginRequest, RemoteTokens};
use crate::token::{IdentityPayload, TokenError, peek_claims, peek_expiry, unix_now};

/// Default bound on a single identity service call.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RemoteResolver<C> {
    client: C,
    timeout: Duration,
}

impl<C: IdentityApi> RemoteResolver<C> {
    pub fn new(client: C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(GatewayError::Timeout))
    }
}

/// Check an unverifiable token is well-formed and not yet expired.
fn check_live(token: &str, now: u64) -> Result<(), TokenError> {
    if now >= peek_expiry(token)? {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Whether `value` can be stored as a cookie value verbatim.
fn is_cookie_safe(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
        })
}

/// Refuse tokens that would break out of the `Set-Cookie` value.
fn checked_tokens(tokens: RemoteTokens) -> Result<RemoteTokens, GatewayError> {
    if !is_cookie_safe(&tokens.access_token) || !is_cookie_safe(&tokens.refresh_token) {
        return Err(GatewayError::InvalidResponse(
            "token contains characters not allowed in a cookie".to_string(),
        ));
    }
    Ok(tokens)
}

fn token_effects(tokens: &RemoteTokens) -> Vec<CredentialEffect> {
    vec![
        CredentialEffect::write(CredentialKind::Access, &tokens.access_token),
        CredentialEffect::write(CredentialKind::Refresh, &tokens.refresh_token),
    ]
}

/// Identity claims of a remote token, when they follow our claim layout.
fn carried_identity(token: &str) -> Option<IdentityPayload> {
    peek_claims(token).ok()
}

impl<C: IdentityApi> SessionResolver for RemoteResolver<C> {
    async fn resolve(&self, credentials: &InboundCredentials) -> Resolution {
        let now = match unix_now() {
            Ok(now) => now,
            Err(e) => return Resolution::unauthenticated(e.into()),
        };

        if let Some(access) = &credentials.access {
            if check_live(access, now).is_ok() {
                return Resolution::authenticated(carried_identity(access));
            }
        }

        let Some(refresh_token) = &credentials.refresh else {
            return Resolution::unauthenticated(AuthError::MissingCredentials);
        };

        if let Err(e) = check_live(refresh_token, now) {
            return Resolution::unauthenticated(e.into());
        }

        let refreshed = self.bounded(self.client.refresh(refresh_token)).await;
        match refreshed.and_then(checked_tokens) {
            Ok(tokens) => Resolution {
                status: AuthStatus::Refreshed,
                identity: carried_identity(&tokens.access_token),
                effects: token_effects(&tokens),
            },
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                Resolution::unauthenticated(e.into())
            }
        }
    }

    async fn login(&self, form: &LoginForm) -> Result<Vec<CredentialEffect>, LoginError> {
        let (username, password) = form.validated()?;
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let issued = self.bounded(self.client.login(&request)).await;
        match issued.and_then(checked_tokens) {
            Ok(tokens) => Ok(token_effects(&tokens)),
            Err(e) => {
                warn!(error = %e, "Remote login failed");
                Err(AuthError::from(e).into())
            }
        }
    }

    async fn logout(&self, credentials: &InboundCredentials) -> Result<(), AuthError> {
        self.bounded(self.client.logout(credentials.access.as_deref()))
            .await
            .map_err(AuthError::from)
    }

    async fn profile(
        &self,
        _identity: Option<&IdentityPayload>,
        credentials: &InboundCredentials,
    ) -> Result<Option<Profile>, AuthError> {
        let Some(access) = credentials.access.as_deref() else {
            return Err(AuthError::MissingCredentials);
        };

        match self.bounded(self.client.profile(access)).await {
            Ok(document) => Ok(Some(Profile::Remote(document))),
            Err(e) => {
                warn!(error = %e, "Profile lookup failed");
                Err(e.into())
            }
        }
    }
}
