//! The session resolver capability shared by every authentication strategy.

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::cookie::{CredentialEffect, InboundCredentials};
use super::errors::{AuthError, LoginError};
use crate::token::{IdentityPayload, User};

/// Outcome of authenticating a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authenticated,
    /// Rotation just occurred; authenticated for routing purposes.
    Refreshed,
    Unauthenticated,
}

impl AuthStatus {
    pub fn is_authenticated(self) -> bool {
        !matches!(self, AuthStatus::Unauthenticated)
    }
}

/// Decision of a resolver plus the credential changes it requires.
///
/// Resolvers never touch the response themselves; the caller applies
/// `effects` to the request's cookie jar.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub status: AuthStatus,
    /// Verified identity, if the strategy can vouch for one
    pub identity: Option<IdentityPayload>,
    pub effects: Vec<CredentialEffect>,
}

impl Resolution {
    pub fn authenticated(identity: Option<IdentityPayload>) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            identity,
            effects: Vec::new(),
        }
    }

    /// Fail closed: unauthenticated, and clear whatever credentials remain.
    pub fn unauthenticated(reason: AuthError) -> Self {
        tracing::debug!(reason = %reason, "Request not authenticated");
        Self {
            status: AuthStatus::Unauthenticated,
            identity: None,
            effects: CredentialEffect::clear_all(),
        }
    }

    pub fn with_effects(mut self, effects: Vec<CredentialEffect>) -> Self {
        self.effects = effects;
        self
    }
}

/// Login form submission. `email` is accepted as an alias for `username`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default, alias = "email")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    /// Trimmed username and password, both required to be non-empty.
    pub fn validated(&self) -> Result<(&str, &str), LoginError> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err(LoginError::missing_fields());
        }
        Ok((username, self.password.as_str()))
    }
}

/// Identity for a login submission.
///
/// There is no user store behind the local strategies: any non-empty
/// username/password pair is accepted and the username becomes the subject.
pub fn demo_user(username: &str) -> User {
    let name = username.split('@').next().unwrap_or(username);
    User {
        id: username.to_string(),
        email: username.to_string(),
        name: name.to_string(),
    }
}

/// Profile of the caller as shown by `/profile`.
///
/// Local strategies vouch for the identity in their own tokens. A remote
/// service returns its own profile document, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Local(User),
    Remote(serde_json::Value),
}

/// An authentication strategy.
///
/// Implementations are chosen once when the router is built; request handling
/// only ever sees this trait.
pub trait SessionResolver: Send + Sync + 'static {
    /// Decide whether the caller is authenticated, rotating credentials if needed.
    fn resolve(&self, credentials: &InboundCredentials) -> impl Future<Output = Resolution> + Send;

    /// Issue credentials for a login submission.
    fn login(
        &self,
        form: &LoginForm,
    ) -> impl Future<Output = Result<Vec<CredentialEffect>, LoginError>> + Send;

    /// Notify whatever issued the credentials that they are being discarded.
    ///
    /// Local credentials are cleared by the caller regardless of the result.
    fn logout(
        &self,
        credentials: &InboundCredentials,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Profile of an authenticated caller.
    ///
    /// Defaults to the identity the resolver already verified.
    fn profile(
        &self,
        identity: Option<&IdentityPayload>,
        _credentials: &InboundCredentials,
    ) -> impl Future<Output = Result<Option<Profile>, AuthError>> + Send {
        let profile = identity.map(|identity| Profile::Local(identity.user()));
        std::future::ready(Ok(profile))
    }
}
