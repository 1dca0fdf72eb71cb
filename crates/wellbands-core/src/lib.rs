//! wellbands-core - Session credential lifecycle for the Wellbands client.
//!
//! The pieces fit together like this: a [`MultiStorage`] writes the
//! credential redundantly to several [`StorageBackend`]s, a
//! [`TokenManager`] tracks expiry and renews through a [`TokenRefresher`],
//! and an [`AuthContext`] exposes the result as observable state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wellbands_core::{AuthContext, MultiStorage, TokenManager, TokenRefresher};
//!
//! # async fn example(refresher: Arc<dyn TokenRefresher>) {
//! let storage = Arc::new(MultiStorage::in_memory());
//! let manager = Arc::new(TokenManager::new(storage, refresher));
//! let context = AuthContext::new(manager);
//!
//! if let Some(_token) = context.restore().await {
//!     println!("still signed in");
//! }
//! # }
//! ```

pub mod context;
pub mod credentials;
pub mod error;
pub mod events;
pub mod manager;
pub mod storage;
pub mod tokens;
pub mod traits;
pub mod types;

pub use context::{AuthContext, AuthState};
pub use credentials::{Credentials, Registration};
pub use error::Error;
pub use events::{SessionEvent, SignOutReason};
pub use manager::{RENEWAL_BUFFER_MS, StoredCredential, TokenManager};
pub use storage::{MemoryStorage, MultiStorage, StorageOp};
pub use tokens::{AccessToken, RefreshToken, TokenGrant};
pub use traits::{
    Authenticator, BackendKind, Clock, ManualClock, Persistence, StorageBackend, SystemClock,
    TokenRefresher,
};
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
