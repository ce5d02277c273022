//! Connector façade over store, token client, and URL builder

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use zoom_auth::constants::STATE_LIFETIME;
use zoom_auth::credentials::{CredentialStore, now_millis};
use zoom_auth::error::{Error, Result};
use zoom_auth::status::{ConnectionState, evaluate};
use zoom_auth::token::TokenClient;
use zoom_auth::url::{UrlBuilder, generate_state};

/// Refresh this far ahead of the access token expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Backoff before the single retry of a transient refresh failure.
const NETWORK_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// A `state` nonce waiting for its authorization callback.
struct PendingState {
    state: String,
    created_at: Instant,
}

/// Façade for the provider connection of one installation.
///
/// Dependencies are passed at construction; there is no ambient
/// registry. The async mutex serializes refreshes: a caller that waited
/// on it re-checks the stored expiry and reuses the fresh token instead
/// of issuing a second provider call, so a burst of requests against an
/// expiring token produces exactly one exchange.
pub struct Connector {
    store: CredentialStore,
    tokens: TokenClient,
    urls: UrlBuilder,
    redirect_uri: String,
    refresh_margin: Duration,
    refresh_lock: AsyncMutex<()>,
    pending_state: Mutex<Option<PendingState>>,
}

impl Connector {
    pub fn new(
        store: CredentialStore,
        tokens: TokenClient,
        urls: UrlBuilder,
        redirect_uri: impl Into<String>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            urls,
            redirect_uri: redirect_uri.into(),
            refresh_margin,
            refresh_lock: AsyncMutex::new(()),
            pending_state: Mutex::new(None),
        }
    }

    /// The credential store backing this connection, for the settings
    /// layer to read and write credentials through.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Start an authorization attempt: generate and remember a fresh
    /// `state` nonce and return the provider authorization URL.
    ///
    /// Requires the app credentials to be complete; without a client ID
    /// the provider would reject the redirect anyway.
    pub fn begin_authorization(&self) -> Result<String> {
        let credentials = self.store.credentials()?;
        if !credentials.has_required_fields() {
            return Err(Error::Auth("provider credentials are incomplete".into()));
        }

        let state = generate_state();
        *self.pending_state.lock().expect("pending state poisoned") = Some(PendingState {
            state: state.clone(),
            created_at: Instant::now(),
        });

        info!("authorization attempt started");
        Ok(self
            .urls
            .authorize_url(&credentials, &self.redirect_uri, &state))
    }

    /// Complete the authorization callback: validate `state`, exchange
    /// the code, persist the resulting tokens.
    ///
    /// A mismatched or expired `state` is rejected before any network
    /// call, leaving stored tokens untouched. The exchange itself is
    /// never retried — authorization codes are single-use, and a code
    /// the provider may already have consumed must not be replayed.
    pub async fn authorize(&self, code: &str, state: &str) -> Result<()> {
        self.consume_state(state)?;

        let credentials = self.store.credentials()?;
        let tokens = self
            .tokens
            .exchange_code(code, &self.redirect_uri, &credentials)
            .await?;
        self.store.save_tokens(&tokens)?;
        info!("authorization complete, connection established");
        Ok(())
    }

    /// Validate and consume the pending `state` nonce (single use).
    fn consume_state(&self, state: &str) -> Result<()> {
        let mut pending = self.pending_state.lock().expect("pending state poisoned");
        match pending.as_ref() {
            Some(p) if p.created_at.elapsed() >= STATE_LIFETIME => {
                *pending = None;
                Err(Error::Auth("authorization attempt expired".into()))
            }
            Some(p) if p.state == state => {
                *pending = None;
                Ok(())
            }
            _ => Err(Error::Auth("state mismatch on authorization callback".into())),
        }
    }

    /// Current derived connection state.
    ///
    /// A storage failure reads as `Disconnected`: the settings screen
    /// should degrade to "not connected" rather than error out.
    pub fn status(&self) -> ConnectionState {
        match self.store.tokens() {
            Ok(tokens) => evaluate(tokens.as_ref(), now_millis()),
            Err(e) => {
                warn!(error = %e, "failed to read stored tokens");
                ConnectionState::Disconnected
            }
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.status() == ConnectionState::Connected
    }

    /// Refresh the access token if it is expired or inside the refresh
    /// margin. Idempotent under concurrency: callers serialized behind
    /// the refresh lock re-check the stored expiry, so only the first
    /// one talks to the provider.
    ///
    /// A transient network failure is retried exactly once after a
    /// short backoff; authorization and protocol failures surface
    /// immediately.
    pub async fn ensure_fresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let Some(tokens) = self.store.tokens()? else {
            return Err(Error::Auth("no connection to refresh".into()));
        };
        if !tokens.expires_within(now_millis(), self.refresh_margin) {
            return Ok(());
        }

        let credentials = self.store.credentials()?;
        let refreshed = match self.tokens.refresh(&tokens.refresh_token, &credentials).await {
            Ok(t) => t,
            Err(Error::Network(msg)) => {
                warn!(error = %msg, "token refresh hit a transient failure, retrying once");
                tokio::time::sleep(NETWORK_RETRY_BACKOFF).await;
                self.tokens.refresh(&tokens.refresh_token, &credentials).await?
            }
            Err(e) => return Err(e),
        };

        self.store.save_tokens(&refreshed)?;
        info!("access token refreshed");
        Ok(())
    }

    /// Drop the connection locally: the token triple is cleared, the
    /// credentials stay, and the provider is not called (local-only
    /// revoke).
    pub fn disconnect(&self) -> Result<()> {
        self.store.clear()?;
        *self.pending_state.lock().expect("pending state poisoned") = None;
        info!("disconnected from provider");
        Ok(())
    }

    /// Local URL that disconnects and then returns to `return_to`.
    pub fn disconnect_url(&self, return_to: &str) -> String {
        self.urls.disconnect_url(return_to)
    }
}
