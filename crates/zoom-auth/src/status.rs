//! Connection status derivation
//!
//! The connection indicator shown on the settings screen is a pure
//! function of the stored token triple and the current time. It is
//! recomputed on every request and never cached; the stored tokens are
//! the single source of truth.

use std::fmt;

use crate::credentials::TokenSet;

/// Derived state of the provider connection.
///
/// `Disconnected` — no complete token set is stored.
/// `Connected` — a complete token set exists and has not expired.
/// `Expired` — a token set exists but its access token is past expiry
/// and no refresh has succeeded since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Expired,
}

impl ConnectionState {
    /// Presentation indicator retained from the settings screen:
    /// `good` / `warning` / `bad`.
    pub fn indicator(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "good",
            ConnectionState::Disconnected => "warning",
            ConnectionState::Expired => "bad",
        }
    }

    /// Short human-readable status line.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "Connected!",
            ConnectionState::Disconnected => "Not connected.",
            ConnectionState::Expired => "Connection expired.",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// Derive the connection state from the stored tokens at `now_millis`.
///
/// `Connected` requires all three token fields present and the expiry
/// still in the future; an incomplete triple degrades to
/// `Disconnected`, a complete but stale one to `Expired`.
pub fn evaluate(tokens: Option<&TokenSet>, now_millis: u64) -> ConnectionState {
    match tokens {
        None => ConnectionState::Disconnected,
        Some(tokens) if !tokens.is_complete() => ConnectionState::Disconnected,
        Some(tokens) if now_millis < tokens.expires_at => ConnectionState::Connected,
        Some(_) => ConnectionState::Expired,
    }
}
