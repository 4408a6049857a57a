//! Session-cookie strategy: one signed cookie carrying the identity.
//!
//! Every authenticated request re-issues the cookie with a fresh expiry, so the
//! session only lapses after a full ttl of inactivity.

use tracing::error;

use super::cookie::{CredentialEffect, CredentialKind, InboundCredentials};
use super::errors::{AuthError, LoginError};
use super::resolver::{LoginForm, Resolution, SessionResolver, demo_user};
use crate::token::{TokenClass, TokenKey, unix_now};

/// Session token default lifetime: 1 hour
pub const SESSION_TOKEN_DURATION_SECS: u64 = 60 * 60;

pub struct SessionCookieResolver {
    key: TokenKey,
}

impl SessionCookieResolver {
    pub fn new(secret: &[u8], ttl: u64) -> Self {
        Self {
            key: TokenKey::new(TokenClass::Session, secret, ttl),
        }
    }

    pub fn key(&self) -> &TokenKey {
        &self.key
    }

    pub fn resolve_at(&self, credentials: &InboundCredentials, now: u64) -> Resolution {
        let Some(token) = &credentials.session else {
            return Resolution::unauthenticated(AuthError::MissingCredentials);
        };

        let claims = match self.key.verify_at(token, now) {
            Ok(claims) => claims,
            Err(e) => return Resolution::unauthenticated(e.into()),
        };

        match self.key.issue_at(&claims.user(), now) {
            Ok(renewed) => Resolution::authenticated(Some(claims))
                .with_effects(vec![CredentialEffect::write(CredentialKind::Session, renewed.token)]),
            Err(e) => {
                error!(error = %e, "Failed to renew session");
                Resolution::unauthenticated(e.into())
            }
        }
    }
}

impl SessionResolver for SessionCookieResolver {
    async fn resolve(&self, credentials: &InboundCredentials) -> Resolution {
        match unix_now() {
            Ok(now) => self.resolve_at(credentials, now),
            Err(e) => Resolution::unauthenticated(e.into()),
        }
    }

    async fn login(&self, form: &LoginForm) -> Result<Vec<CredentialEffect>, LoginError> {
        let (username, _password) = form.validated()?;

        let session = self.key.issue(&demo_user(username)).map_err(|e| {
            error!(error = %e, "Failed to issue session");
            LoginError::internal()
        })?;

        Ok(vec![CredentialEffect::write(
            CredentialKind::Session,
            session.token,
        )])
    }

    async fn logout(&self, _credentials: &InboundCredentials) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::resolver::AuthStatus;
    use crate::token::User;

    const NOW: u64 = 1_700_000_000;

    fn resolver() -> SessionCookieResolver {
        SessionCookieResolver::new(b"session-secret-for-tests", 60)
    }

    fn session(token: String) -> InboundCredentials {
        InboundCredentials {
            session: Some(token),
            ..Default::default()
        }
    }

    fn bob() -> User {
        User {
            id: "uuid-456".to_string(),
            email: "bob@example.com".to_string(),
            name: "Bob".to_string(),
        }
    }

    #[test]
    fn test_valid_session_is_renewed() {
        let resolver = resolver();
        let issued = resolver.key().issue_at(&bob(), NOW).unwrap();

        let resolution = resolver.resolve_at(&session(issued.token.clone()), NOW + 50);

        assert_eq!(resolution.status, AuthStatus::Authenticated);
        assert_eq!(resolution.identity.unwrap().user(), bob());

        let [CredentialEffect::Write { kind, value }] = resolution.effects.as_slice() else {
            panic!("expected exactly one write");
        };
        assert_eq!(*kind, CredentialKind::Session);
        let renewed = resolver.key().verify_at(value, NOW + 100).unwrap();
        assert_eq!(renewed.exp, NOW + 110);
    }

    #[test]
    fn test_expired_session_is_cleared() {
        let resolver = resolver();
        let issued = resolver.key().issue_at(&bob(), NOW).unwrap();

        let resolution = resolver.resolve_at(&session(issued.token), NOW + 60);

        assert_eq!(resolution.status, AuthStatus::Unauthenticated);
        assert!(resolution.effects.contains(&CredentialEffect::Delete {
            kind: CredentialKind::Session
        }));
    }

    #[test]
    fn test_session_from_other_secret_rejected() {
        let other = SessionCookieResolver::new(b"another-session-secret", 60);
        let issued = other.key().issue_at(&bob(), NOW).unwrap();

        let resolution = resolver().resolve_at(&session(issued.token), NOW + 1);
        assert_eq!(resolution.status, AuthStatus::Unauthenticated);
    }

    #[test]
    fn test_missing_session() {
        let resolution = resolver().resolve_at(&InboundCredentials::default(), NOW);
        assert_eq!(resolution.status, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_accepts_email_field() {
        let form: LoginForm =
            serde_json::from_str(r#"{"email": "bob@example.com", "password": "pw"}"#).unwrap();
        let effects = resolver().login(&form).await.unwrap();

        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            CredentialEffect::Write {
                kind: CredentialKind::Session,
                ..
            }
        ));
    }
}
