//! Shared types for the call links workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
