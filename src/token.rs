//! Signed token issuance and verification.
//!
//! Every credential class (access, refresh, session) has its own HMAC key. A token
//! signed with one class key never verifies under another, and the `typ` claim is
//! checked on top of the signature.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Access token default lifetime: 10 seconds
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 10;

/// Refresh token default lifetime: 30 seconds
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 30;

/// Credential class a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    /// Short-lived proof of authentication.
    Access,
    /// Longer-lived token only usable to mint a new access/refresh pair.
    Refresh,
    /// Single sliding session cookie.
    Session,
}

/// The user a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Claims embedded in every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPayload {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    /// Display name
    pub name: String,
    /// Token class
    #[serde(rename = "typ")]
    pub class: TokenClass,
    /// Unique token id, so two tokens issued in the same second differ
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl IdentityPayload {
    /// The user this payload was issued for, without the token metadata.
    pub fn user(&self) -> User {
        User {
            id: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Access and refresh tokens minted together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Clock)
}

/// Signing key for a single credential class.
#[derive(Clone)]
pub struct TokenKey {
    class: TokenClass,
    ttl: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenKey {
    pub fn new(class: TokenClass, secret: &[u8], ttl: u64) -> Self {
        Self {
            class,
            ttl,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn class(&self) -> TokenClass {
        self.class
    }

    /// Token lifetime in seconds.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Sign a new token for `user`, valid from now for the key's ttl.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, unix_now()?)
    }

    pub fn issue_at(&self, user: &User, now: u64) -> Result<IssuedToken, TokenError> {
        let exp = now.checked_add(self.ttl).ok_or(TokenError::Lifetime)?;
        let claims = IdentityPayload {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            class: self.class,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Verify signature, class and expiry against the wall clock.
    pub fn verify(&self, token: &str) -> Result<IdentityPayload, TokenError> {
        self.verify_at(token, unix_now()?)
    }

    /// Verify signature, class and expiry against the given clock reading.
    /// The token is expired once `now` reaches its `exp`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<IdentityPayload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is compared below against the caller's clock.
        validation.validate_exp = false;

        let token_data =
            jsonwebtoken::decode::<IdentityPayload>(token, &self.decoding_key, &validation)
                .map_err(TokenError::from_decode)?;

        let claims = token_data.claims;
        if claims.class != self.class {
            return Err(TokenError::WrongClass);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// Access/refresh key pair used by the local JWT strategy.
#[derive(Clone)]
pub struct TokenCodec {
    access: TokenKey,
    refresh: TokenKey,
}

impl TokenCodec {
    /// Build the codec. Access and refresh secrets must differ.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: u64,
        refresh_ttl: u64,
    ) -> Result<Self, TokenError> {
        if access_secret == refresh_secret {
            return Err(TokenError::SharedSecret);
        }
        Ok(Self {
            access: TokenKey::new(TokenClass::Access, access_secret, access_ttl),
            refresh: TokenKey::new(TokenClass::Refresh, refresh_secret, refresh_ttl),
        })
    }

    pub fn access(&self) -> &TokenKey {
        &self.access
    }

    pub fn refresh(&self) -> &TokenKey {
        &self.refresh
    }

    /// Mint a brand-new access/refresh pair for `user`.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(user, unix_now()?)
    }

    pub fn issue_pair_at(&self, user: &User, now: u64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.access.issue_at(user, now)?,
            refresh: self.refresh.issue_at(user, now)?,
        })
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: u64,
}

/// Decode a JWT payload WITHOUT verifying its signature.
///
/// Only for tokens this process cannot verify (issued by a remote identity
/// service); the result must never be used as proof of anything but expiry.
pub fn peek_claims<T: DeserializeOwned>(token: &str) -> Result<T, TokenError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(TokenError::Malformed),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Unverified expiry timestamp of a JWT.
pub fn peek_expiry(token: &str) -> Result<u64, TokenError> {
    peek_claims::<ExpiryClaim>(token).map(|c| c.exp)
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Not a structurally valid token
    Malformed,
    /// Signature does not match the key
    InvalidSignature,
    /// Past its expiry
    Expired,
    /// Valid signature but issued for another credential class
    WrongClass,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    Clock,
    /// Access and refresh keys configured with the same secret
    SharedSecret,
    /// Lifetime pushes the expiry past what a timestamp can hold
    Lifetime,
}

impl TokenError {
    fn from_decode(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::WrongClass => write!(f, "Wrong token class"),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Clock => write!(f, "System time error"),
            TokenError::SharedSecret => {
                write!(f, "Access and refresh tokens must use different secrets")
            }
            TokenError::Lifetime => write!(f, "Token lifetime out of range"),
        }
    }
}

impl std::error::Error for TokenError {}
