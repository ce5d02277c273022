//! Error taxonomy for the OAuth connection
//!
//! Three provider-facing classes plus local storage failures:
//! - `Auth` is user-actionable (bad code, rejected refresh token, state
//!   mismatch) and renders as "not connected";
//! - `Network` is transient (transport failure, timeout, provider 5xx)
//!   and may be retried once by the connector;
//! - `Protocol` means the provider answered with something we cannot
//!   interpret.
//!
//! Messages carry status codes and short descriptions only — never
//! response bodies, tokens, or client secrets.

/// Errors from OAuth connection operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authorization rejected: {0}")]
    Auth(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("unexpected provider response: {0}")]
    Protocol(String),

    #[error("option store error: {0}")]
    Storage(String),
}

/// Result alias for connection operations.
pub type Result<T> = std::result::Result<T, Error>;
