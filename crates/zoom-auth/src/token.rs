//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (initial connection)
//! 2. Token refresh (before the access token expires)
//!
//! Both operations POST a form to the provider token endpoint with
//! different grant types. This is the only place the client secret goes
//! over the wire, and the only component that performs network I/O.
//!
//! Error mapping: a 4xx answer is an authorization problem (bad or
//! expired code, rejected refresh token), transport failures and 5xx
//! are network problems, and a body that doesn't match the token schema
//! is a protocol problem. Response bodies are never copied into errors
//! or logs.

use serde::Deserialize;
use tracing::debug;

use crate::constants::{TOKEN_ENDPOINT, TOKEN_TIMEOUT};
use crate::credentials::{Credentials, TokenSet, now_millis};
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time; it is
/// converted to an absolute unix millisecond timestamp before storage.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

impl TokenResponse {
    /// Convert to a storable token set anchored at `now_millis`.
    ///
    /// Saturating math: a provider sending a nonsense `expires_in`
    /// must not be able to panic the host, it just gets an expiry
    /// pinned at the far end of the timeline.
    pub fn into_token_set(self, now_millis: u64) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now_millis.saturating_add(self.expires_in.saturating_mul(1000)),
        }
    }
}

/// Client for the provider token endpoint.
pub struct TokenClient {
    http: reqwest::Client,
    token_endpoint: String,
}

impl TokenClient {
    /// Build a client against the given token endpoint with the
    /// standard bounded timeout.
    pub fn new(token_endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            token_endpoint: token_endpoint.into(),
        })
    }

    /// Build a client against the default Zoom token endpoint.
    pub fn default_endpoint() -> Result<Self> {
        Self::new(TOKEN_ENDPOINT)
    }

    /// Exchange an authorization code for tokens (initial connection).
    ///
    /// Codes are single-use and short-lived; an expired or reused code
    /// comes back from the provider as a 4xx and surfaces as `Auth`.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        credentials: &Credentials,
    ) -> Result<TokenSet> {
        debug!("exchanging authorization code");
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &credentials.client_id),
            ("client_secret", credentials.client_secret.expose()),
        ])
        .await
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Safe to call with a stale or revoked refresh token: the provider
    /// answers 4xx and this surfaces as `Auth`.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        credentials: &Credentials,
    ) -> Result<TokenSet> {
        debug!("refreshing access token");
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &credentials.client_id),
            ("client_secret", credentials.client_secret.expose()),
        ])
        .await
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network("token endpoint timed out".into())
                } else {
                    Error::Network("token endpoint unreachable".into())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            // Body deliberately dropped: provider error payloads are
            // not surfaced to callers or logs.
            return Err(Error::Auth(format!("token endpoint returned {status}")));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("token endpoint returned {status}")));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|_| Error::Protocol("token response did not match the expected schema".into()))?;

        if parsed.access_token.is_empty() || parsed.refresh_token.is_empty() {
            return Err(Error::Protocol(
                "token response missing access or refresh token".into(),
            ));
        }

        Ok(parsed.into_token_set(now_millis()))
    }
}
