//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::identity::GatewayError;
use crate::token::TokenError;

/// Why a request could not be authenticated.
///
/// Every variant resolves to the same routing outcome (unauthenticated); the
/// distinction only exists for logs.
#[derive(Debug)]
pub enum AuthError {
    /// Unparseable token
    Malformed,
    InvalidSignature,
    Expired,
    /// The identity service could not be reached or timed out
    TransportFailure(String),
    /// The identity service refused the request
    Rejected(String),
    MissingCredentials,
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::Expired,
            TokenError::InvalidSignature | TokenError::WrongClass => AuthError::InvalidSignature,
            TokenError::Malformed
            | TokenError::Encoding(_)
            | TokenError::Clock
            | TokenError::SharedSecret
            | TokenError::Lifetime => AuthError::Malformed,
        }
    }
}

impl From<GatewayError> for AuthError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Rejected { .. } => AuthError::Rejected(e.to_string()),
            GatewayError::Transport(_) | GatewayError::Timeout | GatewayError::InvalidResponse(_) => {
                AuthError::TransportFailure(e.to_string())
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Malformed => write!(f, "Malformed credential"),
            AuthError::InvalidSignature => write!(f, "Invalid credential signature"),
            AuthError::Expired => write!(f, "Credential expired"),
            AuthError::TransportFailure(e) => write!(f, "Identity service unavailable: {}", e),
            AuthError::Rejected(e) => write!(f, "Identity service rejected request: {}", e),
            AuthError::MissingCredentials => write!(f, "No credentials presented"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Failed login attempt, shown to the user.
///
/// The message is safe for display: it never carries verification or transport
/// details, those are logged where the failure happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginError {
    status: StatusCode,
    message: &'static str,
}

impl LoginError {
    pub fn missing_fields() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Login failed: Username and password are required",
        }
    }

    pub fn invalid_credentials() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Login failed: Invalid username or password",
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Login failed: Please try again later",
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Login failed: Unknown error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl From<AuthError> for LoginError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Rejected(_) => LoginError::invalid_credentials(),
            AuthError::TransportFailure(_) => LoginError::unavailable(),
            AuthError::MissingCredentials => LoginError::missing_fields(),
            AuthError::Malformed | AuthError::InvalidSignature | AuthError::Expired => {
                LoginError::internal()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: &'static str,
    status: &'static str,
}

fn error_response(status: StatusCode, message: &'static str) -> Response {
    (
        status,
        Json(ErrorResponse {
            message,
            status: "error",
        }),
    )
        .into_response()
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        error_response(self.status, self.message)
    }
}

/// Failure on an API route, answered with JSON instead of a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized",
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Service unavailable: Please try again later",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TransportFailure(_) => ApiError::unavailable(),
            _ => ApiError::unauthorized(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_collapse() {
        assert!(matches!(
            AuthError::from(TokenError::WrongClass),
            AuthError::InvalidSignature
        ));
        assert!(matches!(
            AuthError::from(TokenError::Expired),
            AuthError::Expired
        ));
        assert!(matches!(
            AuthError::from(TokenError::Malformed),
            AuthError::Malformed
        ));
    }

    #[test]
    fn test_gateway_errors_collapse() {
        assert!(matches!(
            AuthError::from(GatewayError::Timeout),
            AuthError::TransportFailure(_)
        ));
        assert!(matches!(
            AuthError::from(GatewayError::Rejected {
                status: 401,
                message: "bad password".to_string()
            }),
            AuthError::Rejected(_)
        ));
    }

    #[test]
    fn test_login_error_hides_cause() {
        let err = LoginError::from(AuthError::Rejected("user alice locked: row 42".to_string()));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(!err.message().contains("row 42"));

        let err = LoginError::from(AuthError::TransportFailure("connection refused".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message().contains("refused"));
    }

    #[test]
    fn test_api_errors_hide_details() {
        let err = ApiError::from(AuthError::TransportFailure("dns".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::from(AuthError::Rejected("401: token revoked".to_string()));
        assert_eq!(err, ApiError::unauthorized());
        assert_eq!(err.message, "Unauthorized");
    }
}
