//! Core traits for storage, authentication, token renewal and time.

mod authenticator;
mod clock;
mod refresher;
mod storage;

pub use authenticator::Authenticator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use refresher::TokenRefresher;
pub use storage::{BackendKind, Persistence, StorageBackend};
