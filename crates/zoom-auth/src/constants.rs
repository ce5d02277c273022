//! Zoom OAuth endpoint defaults and option naming
//!
//! The endpoints identify Zoom's public OAuth surface and can be
//! overridden through service configuration (tests point them at a
//! local mock server). The option prefix is kept as-is for
//! compatibility with options written by earlier versions of the
//! integration.

use std::time::Duration;

/// Prefix for every option key owned by this integration.
pub const OPTION_PREFIX: &str = "tribe_zooom_";

/// Authorization endpoint (browser redirect target).
pub const AUTHORIZE_ENDPOINT: &str = "https://zoom.us/oauth/authorize";

/// Token endpoint for code exchange and token refresh.
pub const TOKEN_ENDPOINT: &str = "https://zoom.us/oauth/token";

/// Upper bound on any single token endpoint call.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a pending authorization `state` nonce stays valid.
/// Matches the typical lifetime of a provider authorization code.
pub const STATE_LIFETIME: Duration = Duration::from_secs(600);
