//! OAuth2 client-credentials authentication.
//!
//! [`AuthClient`] keeps the [`TokenStore`] fresh. The actual exchange is behind
//! the [`TokenExchange`] trait so the scheduler can be driven by fakes; the
//! production implementation is [`HelixTokenExchange`].

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::token::{AccessToken, TokenStore};

/// Path of the token endpoint, relative to the authorization base URL.
pub const TOKEN_PATH: &str = "oauth2/token";

const GRANT_TYPE: &str = "client_credentials";
const FIELD_CLIENT_ID: &str = "client_id";
const FIELD_CLIENT_SECRET: &str = "client_secret";
const FIELD_GRANT_TYPE: &str = "grant_type";

/// Application credentials and the channel being followed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub channel_login: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        channel_login: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            channel_login: channel_login.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("channel_login", &self.channel_login)
            .finish()
    }
}

/// Errors raised while obtaining an access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Connection failure, timeout or server-side error.
    #[error("Network error: {0}")]
    Network(String),

    /// The authorization server refused the client id/secret.
    #[error("Credentials rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response did not have the expected shape.
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

impl AuthError {
    /// Check if retrying with the same credentials may succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Check if this error means the configured credentials are wrong.
    #[inline]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// A freshly issued token and its lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchanges application credentials for an access token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, credentials: &Credentials) -> Result<TokenGrant, AuthError>;
}

/// Ensures a valid token is available, refreshing it through a [`TokenExchange`].
pub struct AuthClient<E> {
    exchange: E,
}

impl<E: TokenExchange> AuthClient<E> {
    pub fn new(exchange: E) -> Self {
        Self { exchange }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Return the cached token if it is still valid at `now`, otherwise perform
    /// a client-credentials exchange and store the result.
    pub async fn ensure_token(
        &self,
        store: &mut TokenStore,
        credentials: &Credentials,
        now: Instant,
    ) -> Result<AccessToken, AuthError> {
        if let Some(token) = store.valid_token(now) {
            debug!("Reusing cached access token");
            return Ok(token.clone());
        }

        let grant = self.exchange.exchange(credentials).await?;
        if grant.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "empty access_token".to_string(),
            ));
        }
        if grant.expires_in.is_zero() {
            return Err(AuthError::MalformedResponse(
                "expires_in must be positive".to_string(),
            ));
        }

        let token = AccessToken::issued(grant.access_token, now, grant.expires_in);
        info!(
            expires_in_secs = grant.expires_in.as_secs(),
            "Obtained app access token"
        );
        store.set(token.clone());
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Client-credentials exchange against the Twitch identity service.
#[derive(Debug, Clone)]
pub struct HelixTokenExchange {
    client: Client,
    token_url: Url,
}

impl HelixTokenExchange {
    /// Create an exchange posting to `{auth_base}/oauth2/token`.
    pub fn new(client: Client, auth_base: &str) -> crate::Result<Self> {
        let token_url = crate::http::endpoint(auth_base, TOKEN_PATH)?;
        Ok(Self { client, token_url })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenExchange for HelixTokenExchange {
    async fn exchange(&self, credentials: &Credentials) -> Result<TokenGrant, AuthError> {
        let form = [
            (FIELD_CLIENT_ID, credentials.client_id.as_str()),
            (FIELD_CLIENT_SECRET, credentials.client_secret.as_str()),
            (FIELD_GRANT_TYPE, GRANT_TYPE),
        ];
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        if let Some(kind) = parsed.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                warn!(token_type = %kind, "Unexpected token type");
            }
        }
        Ok(TokenGrant {
            access_token: parsed.access_token,
            expires_in: Duration::from_secs(parsed.expires_in),
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            AuthError::Network(format!("HTTP {}: {}", s.as_u16(), message))
        }
        s => AuthError::MalformedResponse(format!("HTTP {}: {}", s.as_u16(), message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingExchange {
        calls: Arc<AtomicU32>,
        result: Result<TokenGrant, AuthError>,
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn exchange(&self, _credentials: &Credentials) -> Result<TokenGrant, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("id", "secret", "channel")
    }

    fn grant(secs: u64) -> TokenGrant {
        TokenGrant {
            access_token: "token".to_string(),
            expires_in: Duration::from_secs(secs),
        }
    }

    fn client(result: Result<TokenGrant, AuthError>) -> (AuthClient<CountingExchange>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let exchange = CountingExchange {
            calls: calls.clone(),
            result,
        };
        (AuthClient::new(exchange), calls)
    }

    #[tokio::test]
    async fn reuses_valid_token_without_network() {
        let (auth, calls) = client(Ok(grant(3600)));
        let mut store = TokenStore::new(Duration::from_secs(60));
        let now = Instant::now();

        let first = auth.ensure_token(&mut store, &credentials(), now).await.unwrap();
        let second = auth
            .ensure_token(&mut store, &credentials(), now + Duration::from_secs(100))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_inside_safety_margin() {
        let (auth, calls) = client(Ok(grant(3600)));
        let mut store = TokenStore::new(Duration::from_secs(60));
        let now = Instant::now();

        auth.ensure_token(&mut store, &credentials(), now).await.unwrap();
        let refreshed = auth
            .ensure_token(&mut store, &credentials(), now + Duration::from_secs(3550))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            refreshed.expires_at(),
            now + Duration::from_secs(3550) + Duration::from_secs(3600)
        );
    }

    #[tokio::test]
    async fn rejection_leaves_store_untouched() {
        let rejected = AuthError::Rejected {
            status: 403,
            message: "invalid client secret".to_string(),
        };
        let (auth, _) = client(Err(rejected.clone()));
        let mut store = TokenStore::new(Duration::from_secs(60));

        let err = auth
            .ensure_token(&mut store, &credentials(), Instant::now())
            .await
            .unwrap_err();

        assert_eq!(err, rejected);
        assert!(err.is_configuration_error());
        assert!(!err.is_retryable());
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn zero_lifetime_is_malformed() {
        let (auth, _) = client(Ok(grant(0)));
        let mut store = TokenStore::new(Duration::from_secs(60));
        let err = auth
            .ensure_token(&mut store, &credentials(), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, r#"{"status":403,"message":"invalid client secret"}"#),
            AuthError::Rejected { status: 403, ref message } if message == "invalid client secret"
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            AuthError::Network(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            AuthError::Network(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            AuthError::MalformedResponse(_)
        ));
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", Credentials::new("id", "hunter2", "channel"));
        assert!(rendered.contains("channel"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
