//! Reading and writing the session record through a [`StorageBackend`].

use std::time::Duration;

use chrono::Utc;

use ts_domain::trace::TraceEvent;

use crate::backend::{CookieOptions, StorageBackend};
use crate::codec;
use crate::state::{SessionState, EXPIRE_KEY};

/// Read and decode the stored record.  Absent or malformed → empty record.
pub fn retrieve_session(backend: &StorageBackend) -> SessionState {
    codec::decode(backend.read().as_deref())
}

/// Persist `session` and return what was stored.
///
/// An empty (expired) record removes the entry instead.  Any other record is
/// stamped with a fresh `expire` before being written, whatever the caller put
/// there.
pub fn persist_session(
    session: SessionState,
    options: &CookieOptions,
    backend: &StorageBackend,
) -> SessionState {
    if session.is_expired() {
        clear_session(options, backend);
        return session;
    }
    let session = stamp_expiration(session, Utc::now().timestamp_millis(), backend.expiration_delay());
    write_session(&session, options, backend);
    TraceEvent::SessionPersisted {
        storage: backend.kind().to_string(),
        keys: session.len(),
    }
    .emit();
    session
}

/// Write the record as-is, without touching `expire`.
pub fn write_session(session: &SessionState, options: &CookieOptions, backend: &StorageBackend) {
    backend.write(&codec::encode(session), options);
}

/// Remove the record from storage.
pub fn clear_session(options: &CookieOptions, backend: &StorageBackend) {
    backend.remove(options);
    TraceEvent::SessionCleared {
        storage: backend.kind().to_string(),
    }
    .emit();
}

/// Return `session` with `expire = now_ms + delay`.
pub fn stamp_expiration(session: SessionState, now_ms: i64, delay: Duration) -> SessionState {
    let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
    let expire = now_ms.saturating_add(delay_ms);
    session.with(EXPIRE_KEY, expire.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{InMemoryCookieJar, InMemoryKeyValueStore, MemorySlot};

    fn cookie_backend() -> StorageBackend {
        StorageBackend::cookie(Arc::new(InMemoryCookieJar::new()))
    }

    #[test]
    fn stamp_is_pure() {
        let original = SessionState::new().with("id", "abc").with(EXPIRE_KEY, "1");
        let stamped = stamp_expiration(original.clone(), 1_000, Duration::from_millis(500));
        assert_eq!(original.expire(), Some("1"));
        assert_eq!(stamped.expire(), Some("1500"));
        assert_eq!(stamped.id(), Some("abc"));
    }

    #[test]
    fn retrieve_missing_is_empty() {
        assert!(retrieve_session(&cookie_backend()).is_empty());
    }

    #[test]
    fn persist_overwrites_expire() {
        let backend = cookie_backend();
        let before = Utc::now().timestamp_millis();
        let session = SessionState::new().with("id", "abc").with(EXPIRE_KEY, "42");

        let stored = persist_session(session, &CookieOptions::default(), &backend);

        let expire = stored.expire_at_ms().unwrap();
        assert!(expire >= before);
        assert!(expire >= before + 15 * 60 * 1000);
        assert_eq!(retrieve_session(&backend), stored);
    }

    #[test]
    fn persist_empty_clears() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let backend = StorageBackend::local_storage(store.clone());
        persist_session(
            SessionState::new().with("id", "abc"),
            &CookieOptions::default(),
            &backend,
        );
        assert!(backend.read().is_some());

        let stored = persist_session(SessionState::new(), &CookieOptions::default(), &backend);
        assert!(stored.is_empty());
        assert!(backend.read().is_none());
    }

    #[test]
    fn write_session_keeps_expire() {
        let backend = StorageBackend::memory(MemorySlot::new());
        let session = SessionState::new().with("id", "abc").with(EXPIRE_KEY, "7");
        write_session(&session, &CookieOptions::default(), &backend);
        assert_eq!(retrieve_session(&backend).expire(), Some("7"));
    }

    #[test]
    fn garbage_in_storage_reads_as_empty() {
        let backend = StorageBackend::memory(MemorySlot::new());
        backend.write("GA1.2.3", &CookieOptions::default());
        assert!(retrieve_session(&backend).is_empty());
    }
}
