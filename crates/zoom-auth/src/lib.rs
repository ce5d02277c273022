//! Zoom OAuth authorization library
//!
//! Provides credential/token persistence over the host option store,
//! the token endpoint client, authorization URL construction, and
//! connection status derivation for the event call links integration.
//! This crate is a standalone library with no dependency on the service
//! binary — it can be tested and used independently.
//!
//! Connection flow:
//! 1. Admin submits app credentials, stored via `CredentialStore::save_credentials()`
//! 2. UI sends the user to `UrlBuilder::authorize_url()` with a fresh `state`
//! 3. Provider redirects back with an authorization code
//! 4. `TokenClient::exchange_code()` trades the code for tokens
//! 5. Tokens persisted via `CredentialStore::save_tokens()`
//! 6. `status::evaluate()` derives the connection indicator on demand

pub mod constants;
pub mod credentials;
pub mod error;
pub mod fields;
pub mod status;
pub mod token;
pub mod url;

pub use constants::*;
pub use credentials::{
    CredentialStore, Credentials, FileOptionStore, MemoryOptionStore, OptionStore, TokenSet,
    now_millis,
};
pub use error::{Error, Result};
pub use fields::{FieldDescriptor, FieldKind, settings_fields};
pub use status::{ConnectionState, evaluate};
pub use token::{TokenClient, TokenResponse};
pub use url::{UrlBuilder, generate_state};
