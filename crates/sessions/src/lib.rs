//! Session record persistence for TabSession.
//!
//! The record is a flat `key=value&…` string shared by every tab through a
//! cookie (or local storage, session storage, or an in-process slot).
//! [`ClientLockCoordinator`] serializes read-modify-write access from this
//! process and guards it against other tabs with an optimistic lock.

pub mod backend;
pub mod codec;
pub mod lock;
pub mod migration;
pub mod persistence;
pub mod state;

pub use backend::{
    CookieAccessor, CookieOptions, InMemoryCookieJar, InMemoryKeyValueStore, KeyValueStore,
    MemorySlot, StorageBackend, SESSION_EXPIRATION_DELAY, SESSION_IDENTIFIER,
};
pub use codec::{decode, encode, encode as to_session_string};
pub use lock::{
    ClientLockCoordinator, LockRequest, TokenGenerator, UuidTokens, LOCK_RETRY_DELAY,
    MAX_NUMBER_OF_LOCK_RETRIES,
};
pub use migration::try_old_cookies_migration;
pub use persistence::{persist_session, retrieve_session};
pub use state::SessionState;
pub use ts_domain::config::StorageKind;
