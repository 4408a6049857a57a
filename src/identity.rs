//! Client for the remote identity service used by the gateway strategy.
//!
//! Endpoints (relative to the configured base URL):
//! - POST `auth/login` - `{username, password}` -> `{accessToken, refreshToken}`
//! - POST `auth/refresh-token` - bearer refresh token -> `{accessToken, refreshToken}`
//! - POST `auth/logout` - bearer access token
//! - GET `users/profile` - bearer access token -> profile document

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::APP_USER_AGENT;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token pair minted by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Operations the gateway needs from an identity service.
pub trait IdentityApi: Send + Sync + 'static {
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<RemoteTokens, GatewayError>> + Send;

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<RemoteTokens, GatewayError>> + Send;

    fn logout(
        &self,
        access_token: Option<&str>,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Profile document of the token's owner, in whatever shape the service uses.
    fn profile(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<serde_json::Value, GatewayError>> + Send;
}

/// `IdentityApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    client: Client,
    base_url: Url,
}

impl HttpIdentityClient {
    pub fn new(mut base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Transport)?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Transport(e)
            }
        })?;

        if !response.status().is_success() {
            #[derive(Deserialize)]
            struct ErrorBody {
                message: Option<String>,
                error: Option<String>,
            }

            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message.or(body.error))
                .unwrap_or_else(|| status.to_string());

            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

impl IdentityApi for HttpIdentityClient {
    #[instrument(skip_all)]
    async fn login(&self, request: &LoginRequest) -> Result<RemoteTokens, GatewayError> {
        let url = self.endpoint("auth/login")?;
        self.send_json(self.client.post(url).json(request)).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<RemoteTokens, GatewayError> {
        let url = self.endpoint("auth/refresh-token")?;
        self.send_json(self.client.post(url).bearer_auth(refresh_token))
            .await
    }

    #[instrument(skip_all)]
    async fn logout(&self, access_token: Option<&str>) -> Result<(), GatewayError> {
        let url = self.endpoint("auth/logout")?;
        let mut request = self.client.post(url);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip_all)]
    async fn profile(&self, access_token: &str) -> Result<serde_json::Value, GatewayError> {
        let url = self.endpoint("users/profile")?;
        self.send_json(self.client.get(url).bearer_auth(access_token))
            .await
    }
}

/// Errors talking to the identity service.
#[derive(Debug)]
pub enum GatewayError {
    /// Connection, TLS or request building failure
    Transport(reqwest::Error),
    /// No answer within the configured timeout
    Timeout,
    /// Non-success status
    Rejected { status: u16, message: String },
    /// Success status but a body we could not use
    InvalidResponse(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Transport(e) => write!(f, "Transport error: {}", e),
            GatewayError::Timeout => write!(f, "Identity service timed out"),
            GatewayError::Rejected { status, message } => {
                write!(f, "Identity service returned {}: {}", status, message)
            }
            GatewayError::InvalidResponse(e) => write!(f, "Invalid identity response: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {}
