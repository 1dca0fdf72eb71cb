//! Key/value persistence across several backends.
//!
//! The session credential is written redundantly to every backend that
//! will take it, so that a single disabled or wiped backend does not log
//! the user out. See [`MultiStorage`].

mod memory;
mod multi;

pub use memory::MemoryStorage;
pub use multi::{MultiStorage, StorageOp};

/// Storage key of the access token.
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";

/// Storage key of the access token expiry, in epoch milliseconds.
pub const EXPIRY_KEY: &str = "auth_expiry";

/// Storage key of the "remember me" flag.
pub const REMEMBER_ME_KEY: &str = "auth_remember_me";

/// Key used by the older single-token login path.
pub const LEGACY_TOKEN_KEY: &str = "token";

/// The four keys making up a stored session credential.
pub const CREDENTIAL_KEYS: [&str; 4] = [TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRY_KEY, REMEMBER_ME_KEY];
