//! Credential and token persistence over the host option store
//!
//! The host exposes a flat, persisted key-value map of settings. This
//! module wraps it with a namespaced `CredentialStore` that owns every
//! option written by the integration: the five app credentials entered
//! by an administrator and the token triple produced by the OAuth flow.
//! No other component writes to storage directly.
//!
//! Two `OptionStore` implementations ship: an in-memory map for tests
//! and embedding, and a JSON file store whose writes are atomic
//! (temp file + rename, 0600 permissions) since it holds OAuth tokens.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::Secret;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Current time as a unix timestamp in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Persisted key-value settings map, as provided by the host.
///
/// Access is synchronous and local; implementations must make every
/// write durable before returning.
pub trait OptionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Provider-issued app credentials, entered once by an administrator.
///
/// The client secret and API key are wrapped so they stay out of Debug
/// output and log lines.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub app_id: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub user_id: String,
    pub api_key: Secret<String>,
}

impl Credentials {
    /// Whether the minimum set of fields required to talk to the
    /// provider API has been entered.
    pub fn has_required_fields(&self) -> bool {
        !self.app_id.is_empty()
            && !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.user_id.is_empty()
            && !self.api_key.is_empty()
    }
}

/// The token triple produced by a code exchange or refresh.
///
/// `expires_at` is a unix timestamp in milliseconds, computed at
/// storage time from the provider's `expires_in` seconds delta. It only
/// advances through a successful exchange or refresh — never by
/// client-side guessing.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: u64,
}

impl TokenSet {
    /// All three fields present. The provider never issues an access
    /// token without a refresh token in this flow, so a partial triple
    /// is treated as no connection at all.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty() && self.expires_at > 0
    }

    /// Whether the access token is already expired or will expire
    /// within `margin` of `now_millis`.
    pub fn expires_within(&self, now_millis: u64, margin: Duration) -> bool {
        self.expires_at <= now_millis + margin.as_millis() as u64
    }
}

impl fmt::Debug for TokenSet {
    // Tokens are bearer secrets; only the expiry is loggable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Namespaced credential/token storage over an `OptionStore`.
///
/// Every key is `{prefix}{field}`; the prefix is supplied at
/// construction rather than held in shared mutable state.
pub struct CredentialStore {
    store: std::sync::Arc<dyn OptionStore>,
    prefix: String,
}

const TOKEN_KEYS: [&str; 3] = ["access_token", "refresh_token", "expires_at"];

impl CredentialStore {
    pub fn new(store: std::sync::Arc<dyn OptionStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn read(&self, name: &str) -> Result<String> {
        Ok(self.store.get(&self.key(name))?.unwrap_or_default())
    }

    /// Read both the credentials and the stored token triple.
    pub fn get(&self) -> Result<(Credentials, Option<TokenSet>)> {
        Ok((self.credentials()?, self.tokens()?))
    }

    /// Read the stored app credentials. Unset fields come back as
    /// empty strings, matching the host's option semantics.
    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            app_id: self.read("app_id")?,
            client_id: self.read("client_id")?,
            client_secret: Secret::new(self.read("client_secret")?),
            user_id: self.read("user_id")?,
            api_key: Secret::new(self.read("api_key")?),
        })
    }

    /// Read the stored token triple, if a complete one exists.
    ///
    /// An incomplete triple or an unparseable expiry reads back as no
    /// connection; the status layer then reports `Disconnected` rather
    /// than trusting half-written state.
    pub fn tokens(&self) -> Result<Option<TokenSet>> {
        let access_token = self.read("access_token")?;
        let refresh_token = self.read("refresh_token")?;
        let expires_raw = self.read("expires_at")?;

        if access_token.is_empty() && refresh_token.is_empty() && expires_raw.is_empty() {
            return Ok(None);
        }

        let expires_at = match expires_raw.parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                warn!("stored token expiry is not a timestamp, treating connection as absent");
                return Ok(None);
            }
        };

        let tokens = TokenSet {
            access_token,
            refresh_token,
            expires_at,
        };
        if !tokens.is_complete() {
            warn!("stored token triple is incomplete, treating connection as absent");
            return Ok(None);
        }
        Ok(Some(tokens))
    }

    /// Persist the app credentials.
    pub fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.store.set(&self.key("app_id"), &credentials.app_id)?;
        self.store
            .set(&self.key("client_id"), &credentials.client_id)?;
        self.store
            .set(&self.key("client_secret"), credentials.client_secret.expose())?;
        self.store.set(&self.key("user_id"), &credentials.user_id)?;
        self.store
            .set(&self.key("api_key"), credentials.api_key.expose())?;
        debug!("saved app credentials");
        Ok(())
    }

    /// Persist a token triple, replacing any previous one wholesale.
    pub fn save_tokens(&self, tokens: &TokenSet) -> Result<()> {
        self.store
            .set(&self.key("access_token"), &tokens.access_token)?;
        self.store
            .set(&self.key("refresh_token"), &tokens.refresh_token)?;
        self.store
            .set(&self.key("expires_at"), &tokens.expires_at.to_string())?;
        debug!(expires_at = tokens.expires_at, "saved token set");
        Ok(())
    }

    /// Remove the token triple only. Credentials stay put — a
    /// disconnect must not force re-entry of the app and client IDs.
    pub fn clear(&self) -> Result<()> {
        for name in TOKEN_KEYS {
            self.store.delete(&self.key(name))?;
        }
        debug!("cleared token set");
        Ok(())
    }
}

/// In-memory option store for tests and embedding.
#[derive(Default)]
pub struct MemoryOptionStore {
    state: Mutex<HashMap<String, String>>,
}

impl OptionStore for MemoryOptionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().expect("option map poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .expect("option map poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.state.lock().expect("option map poisoned").remove(key);
        Ok(())
    }
}

/// JSON-file option store.
///
/// The whole map is loaded once at startup, so reads never touch the
/// disk. Every mutation rewrites the file atomically: write to a temp
/// file in the same directory, then rename over the target, so a crash
/// mid-write cannot corrupt stored tokens.
pub struct FileOptionStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileOptionStore {
    /// Load options from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` so future loads
    /// skip the cold-start path.
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("reading options file: {e}")))?;
            let options: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing options file: {e}")))?;
            info!(path = %path.display(), options = options.len(), "loaded options");
            options
        } else {
            info!(path = %path.display(), "options file not found, starting empty");
            let options = HashMap::new();
            write_atomic(&path, &options)?;
            options
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl OptionStore for FileOptionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().expect("option map poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().expect("option map poisoned");
        state.insert(key.to_string(), value.to_string());
        write_atomic(&self.path, &state)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().expect("option map poisoned");
        if state.remove(key).is_some() {
            write_atomic(&self.path, &state)?;
        }
        Ok(())
    }
}

/// Write the option map to a file atomically with 0600 permissions.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing options: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("options path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".options.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Storage(format!("writing temp options file: {e}")))?;

    // 0600: the file holds OAuth tokens (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Storage(format!("setting options file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("renaming temp options file: {e}")))?;

    debug!(path = %path.display(), "persisted options");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn test_credentials() -> Credentials {
        Credentials {
            app_id: "app-1".into(),
            client_id: "abc".into(),
            client_secret: Secret::new("xyz".into()),
            user_id: "user-1".into(),
            api_key: Secret::new("key-1".into()),
        }
    }

    fn test_tokens() -> TokenSet {
        TokenSet {
            access_token: "A1".into(),
            refresh_token: "R1".into(),
            expires_at: 4_102_444_800_000,
        }
    }

    fn memory_store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryOptionStore::default()), "tribe_zooom_")
    }

    #[test]
    fn credentials_roundtrip_with_prefix() {
        let backing = Arc::new(MemoryOptionStore::default());
        let store = CredentialStore::new(backing.clone(), "tribe_zooom_");

        store.save_credentials(&test_credentials()).unwrap();

        // Keys land under the namespace, not bare
        assert_eq!(
            backing.get("tribe_zooom_client_id").unwrap().as_deref(),
            Some("abc")
        );
        assert!(backing.get("client_id").unwrap().is_none());

        let loaded = store.credentials().unwrap();
        assert_eq!(loaded.app_id, "app-1");
        assert_eq!(loaded.client_secret.expose(), "xyz");
        assert!(loaded.has_required_fields());
    }

    #[test]
    fn missing_credentials_read_back_empty() {
        let store = memory_store();
        let creds = store.credentials().unwrap();
        assert_eq!(creds.client_id, "");
        assert!(!creds.has_required_fields());
        assert!(store.tokens().unwrap().is_none());
    }

    #[test]
    fn tokens_roundtrip() {
        let store = memory_store();
        store.save_tokens(&test_tokens()).unwrap();
        let loaded = store.tokens().unwrap().unwrap();
        assert_eq!(loaded, test_tokens());
    }

    #[test]
    fn clear_removes_tokens_but_keeps_credentials() {
        let store = memory_store();
        store.save_credentials(&test_credentials()).unwrap();
        store.save_tokens(&test_tokens()).unwrap();

        store.clear().unwrap();

        let (creds, tokens) = store.get().unwrap();
        assert!(tokens.is_none());
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.api_key.expose(), "key-1");
    }

    #[test]
    fn incomplete_token_triple_reads_as_absent() {
        let backing = Arc::new(MemoryOptionStore::default());
        let store = CredentialStore::new(backing.clone(), "tribe_zooom_");
        backing.set("tribe_zooom_access_token", "A1").unwrap();
        // refresh_token and expires_at never written
        assert!(store.tokens().unwrap().is_none());
    }

    #[test]
    fn garbage_expiry_reads_as_absent() {
        let backing = Arc::new(MemoryOptionStore::default());
        let store = CredentialStore::new(backing.clone(), "tribe_zooom_");
        backing.set("tribe_zooom_access_token", "A1").unwrap();
        backing.set("tribe_zooom_refresh_token", "R1").unwrap();
        backing.set("tribe_zooom_expires_at", "soon").unwrap();
        assert!(store.tokens().unwrap().is_none());
    }

    #[test]
    fn token_set_debug_redacts_tokens() {
        let debug = format!("{:?}", test_tokens());
        assert!(!debug.contains("A1"), "debug output leaked access token: {debug}");
        assert!(!debug.contains("R1"), "debug output leaked refresh token: {debug}");
        assert!(debug.contains("4102444800000"));
    }

    #[test]
    fn expires_within_respects_margin() {
        let tokens = TokenSet {
            expires_at: 1_000_000,
            ..test_tokens()
        };
        assert!(tokens.expires_within(999_000, Duration::from_secs(5)));
        assert!(tokens.expires_within(1_000_001, Duration::from_secs(0)));
        assert!(!tokens.expires_within(500_000, Duration::from_secs(5)));
    }

    #[test]
    fn file_store_roundtrip_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");

        let store = FileOptionStore::load(path.clone()).unwrap();
        store.set("tribe_zooom_client_id", "abc").unwrap();
        store.set("tribe_zooom_access_token", "A1").unwrap();
        store.delete("tribe_zooom_access_token").unwrap();

        let reloaded = FileOptionStore::load(path).unwrap();
        assert_eq!(
            reloaded.get("tribe_zooom_client_id").unwrap().as_deref(),
            Some("abc")
        );
        assert!(reloaded.get("tribe_zooom_access_token").unwrap().is_none());
    }

    #[test]
    fn file_store_cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");

        assert!(!path.exists());
        let _store = FileOptionStore::load(path.clone()).unwrap();
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");

        let store = FileOptionStore::load(path.clone()).unwrap();
        store.set("tribe_zooom_refresh_token", "R1").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "options file must be 0600, got {mode:o}");
    }

}
