//! Local JWT strategy: access and refresh tokens verified in-process.
//!
//! An expired or invalid access token with a valid refresh token triggers
//! rotation: a brand-new access/refresh pair is minted and written back.

use tracing::{debug, error};

use super::cookie::{CredentialEffect, CredentialKind, InboundCredentials};
use super::errors::{AuthError, LoginError};
use super::resolver::{AuthStatus, LoginForm, Resolution, SessionResolver, demo_user};
use crate::token::{TokenCodec, TokenPair, unix_now};

pub struct JwtResolver {
    codec: TokenCodec,
}

impl JwtResolver {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Resolve against an explicit clock reading.
    pub fn resolve_at(&self, credentials: &InboundCredentials, now: u64) -> Resolution {
        if let Some(token) = &credentials.access {
            match self.codec.access().verify_at(token, now) {
                Ok(identity) => return Resolution::authenticated(Some(identity)),
                Err(e) => debug!(error = %e, "Access token rejected, trying refresh token"),
            }
        }

        let Some(refresh_token) = &credentials.refresh else {
            return Resolution::unauthenticated(AuthError::MissingCredentials);
        };

        let refresh_claims = match self.codec.refresh().verify_at(refresh_token, now) {
            Ok(claims) => claims,
            Err(e) => return Resolution::unauthenticated(e.into()),
        };

        let rotated = self
            .codec
            .issue_pair_at(&refresh_claims.user(), now)
            .and_then(|pair| {
                let identity = self.codec.access().verify_at(&pair.access.token, now)?;
                Ok((pair, identity))
            });

        match rotated {
            Ok((pair, identity)) => Resolution {
                status: AuthStatus::Refreshed,
                identity: Some(identity),
                effects: pair_effects(&pair),
            },
            Err(e) => {
                error!(error = %e, "Failed to rotate tokens");
                Resolution::unauthenticated(e.into())
            }
        }
    }
}

fn pair_effects(pair: &TokenPair) -> Vec<CredentialEffect> {
    vec![
        CredentialEffect::write(CredentialKind::Access, &pair.access.token),
        CredentialEffect::write(CredentialKind::Refresh, &pair.refresh.token),
    ]
}

impl SessionResolver for JwtResolver {
    async fn resolve(&self, credentials: &InboundCredentials) -> Resolution {
        match unix_now() {
            Ok(now) => self.resolve_at(credentials, now),
            Err(e) => Resolution::unauthenticated(e.into()),
        }
    }

    async fn login(&self, form: &LoginForm) -> Result<Vec<CredentialEffect>, LoginError> {
        let (username, _password) = form.validated()?;

        let pair = self.codec.issue_pair(&demo_user(username)).map_err(|e| {
            error!(error = %e, "Failed to issue tokens");
            LoginError::internal()
        })?;

        Ok(pair_effects(&pair))
    }

    async fn logout(&self, _credentials: &InboundCredentials) -> Result<(), AuthError> {
        Ok(())
    }
}
