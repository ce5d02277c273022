//! Connection lifecycle for the Zoom integration
//!
//! Composes the credential store, token client, and URL builder into a
//! single connector that the service routes talk to. The connector is
//! the one place that decides whether an error is retried or surfaced,
//! and the one place that serializes token refreshes so concurrent
//! requests cannot race a refresh token out from under each other.
//!
//! Connection lifecycle:
//! 1. `begin_authorization()` — fresh `state` nonce, provider URL
//! 2. Provider redirects back, `authorize(code, state)` exchanges the code
//! 3. `ensure_fresh()` refreshes ahead of expiry (serialized, single-flight)
//! 4. `disconnect()` drops the tokens locally, credentials stay

pub mod connector;

pub use connector::{Connector, DEFAULT_REFRESH_MARGIN};
