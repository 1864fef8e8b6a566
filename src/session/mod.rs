//! Session state: the persisted actor, its storage, and expiry enforcement.

pub mod expiry;
mod model;
mod provider;
pub mod storage;

pub use expiry::{ExpiryHandler, ExpiryWatcher};
pub use model::{Role, Session, UnknownRole, UserProfile, is_expired, is_expired_at, now_unix};
pub use provider::SessionProvider;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
