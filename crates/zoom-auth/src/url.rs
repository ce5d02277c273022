//! Authorization and disconnect URL construction
//!
//! Builds the provider authorization URL the browser is sent to, and
//! the local disconnect URL that routes through the connector before
//! bouncing back to the page the administrator came from.
//!
//! The `state` parameter is an unguessable nonce generated per
//! authorization attempt; the provider returns it unchanged in the
//! callback and the connector rejects any mismatch.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

use crate::credentials::Credentials;

/// Generate a fresh anti-CSRF `state` nonce.
///
/// 32 random bytes encoded as URL-safe base64 without padding
/// (43 characters), so it can be embedded in a query string as-is.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Builds provider-facing and site-local URLs for the connection flow.
pub struct UrlBuilder {
    authorize_endpoint: String,
    site_base: String,
}

impl UrlBuilder {
    /// `site_base` is the installation's own base URL (no trailing
    /// slash); local routes are built relative to it.
    pub fn new(authorize_endpoint: impl Into<String>, site_base: impl Into<String>) -> Self {
        Self {
            authorize_endpoint: authorize_endpoint.into(),
            site_base: site_base.into(),
        }
    }

    /// The provider authorization URL for the standard code flow.
    pub fn authorize_url(
        &self,
        credentials: &Credentials,
        redirect_uri: &str,
        state: &str,
    ) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            self.authorize_endpoint,
            urlencoded(&credentials.client_id),
            urlencoded(redirect_uri),
            state,
        )
    }

    /// The local URL that disconnects the integration and then
    /// redirects back to `return_to`.
    pub fn disconnect_url(&self, return_to: &str) -> String {
        format!(
            "{}/oauth/disconnect?return_to={}",
            self.site_base,
            urlencoded(return_to),
        )
    }
}

/// Minimal URL encoding for parameter values.
/// Covers the characters that would break query-string parsing.
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('&', "%26")
        .replace('=', "%3D")
        .replace('#', "%23")
        .replace('+', "%2B")
}
