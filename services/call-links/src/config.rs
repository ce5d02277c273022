//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Provider endpoints default to Zoom's public OAuth surface and are
//! overridable so staging and tests can point at a local server. No
//! secrets live in the config file — credentials arrive through the
//! settings API and land in the option store.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use zoom_auth::constants::{AUTHORIZE_ENDPOINT, OPTION_PREFIX, TOKEN_ENDPOINT};
use zoom_connector::DEFAULT_REFRESH_MARGIN;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
}

/// HTTP listener and site identity
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// The installation's public base URL, no trailing slash.
    pub site_base: String,
    /// Where callback/disconnect redirects land (the settings screen).
    pub settings_url: String,
}

/// Provider OAuth endpoints
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    /// Refresh this many seconds ahead of access token expiry.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

/// Option store location and namespace
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub options_path: PathBuf,
    #[serde(default = "default_option_prefix")]
    pub option_prefix: String,
}

fn default_authorize_endpoint() -> String {
    AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_refresh_margin_secs() -> u64 {
    DEFAULT_REFRESH_MARGIN.as_secs()
}

fn default_option_prefix() -> String {
    OPTION_PREFIX.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        for (name, url) in [
            ("site_base", &config.server.site_base),
            ("settings_url", &config.server.settings_url),
            ("authorize_endpoint", &config.provider.authorize_endpoint),
            ("token_endpoint", &config.provider.token_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        // Trailing slash would double up when joining local routes
        while config.server.site_base.ends_with('/') {
            config.server.site_base.pop();
        }

        if config.provider.refresh_margin_secs == 0 {
            return Err(common::Error::Config(
                "refresh_margin_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("event-call-links.toml")
    }

    /// The OAuth redirect URI registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth/callback", self.server.site_base)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.provider.refresh_margin_secs)
    }
}
