//! One-shot migration from the legacy three-cookie layout.
//!
//! Older SDK versions stored the session id, the logs flag and the RUM flag
//! in separate cookies.  When no current-format record exists yet, the legacy
//! values that are present and well-formed are folded into a new record.
//! This has to stay around as long as old SDK versions are live.

use std::sync::Arc;

use ts_domain::trace::TraceEvent;

use crate::backend::{CookieAccessor, CookieOptions, StorageBackend};
use crate::persistence::persist_session;
use crate::state::{SessionState, ID_KEY};

pub const OLD_SESSION_IDENTIFIER: &str = "_dd";
pub const OLD_RUM_COOKIE_NAME: &str = "_dd_r";
pub const OLD_LOGS_COOKIE_NAME: &str = "_dd_l";

pub const RUM_SESSION_KEY: &str = "rum";
pub const LOGS_SESSION_KEY: &str = "logs";

/// Run the migration against `jar` for the record stored under
/// `session_name`.  Returns the persisted record, or `None` when a
/// current-format record already exists and nothing was touched.
pub fn try_old_cookies_migration(
    jar: &Arc<dyn CookieAccessor>,
    session_name: &str,
    options: &CookieOptions,
) -> Option<SessionState> {
    if jar.get(session_name).is_some_and(|current| !current.is_empty()) {
        return None;
    }

    let old_id = jar.get(OLD_SESSION_IDENTIFIER).filter(|id| !id.is_empty());
    let old_logs = jar
        .get(OLD_LOGS_COOKIE_NAME)
        .filter(|v| matches!(v.as_str(), "0" | "1"));
    let old_rum = jar
        .get(OLD_RUM_COOKIE_NAME)
        .filter(|v| matches!(v.as_str(), "0" | "1" | "2"));

    TraceEvent::LegacyCookiesMigrated {
        had_id: old_id.is_some(),
        had_rum: old_rum.is_some(),
        had_logs: old_logs.is_some(),
    }
    .emit();

    let mut session = SessionState::new();
    if let Some(id) = old_id {
        session.insert(ID_KEY, id);
    }
    if let Some(logs) = old_logs {
        session.insert(LOGS_SESSION_KEY, logs);
    }
    if let Some(rum) = old_rum {
        session.insert(RUM_SESSION_KEY, rum);
    }

    let backend = StorageBackend::cookie(Arc::clone(jar)).with_name(session_name);
    Some(persist_session(session, options, &backend))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::{InMemoryCookieJar, SESSION_EXPIRATION_DELAY, SESSION_IDENTIFIER};

    fn jar() -> Arc<dyn CookieAccessor> {
        Arc::new(InMemoryCookieJar::new())
    }

    fn set(jar: &Arc<dyn CookieAccessor>, name: &str, value: &str) {
        jar.set(name, value, SESSION_EXPIRATION_DELAY, &CookieOptions::default());
    }

    #[test]
    fn current_cookie_is_left_alone() {
        let jar = jar();
        set(&jar, SESSION_IDENTIFIER, "id=abcde&rum=0&logs=1");
        set(&jar, OLD_SESSION_IDENTIFIER, "zzz");

        assert!(try_old_cookies_migration(&jar, SESSION_IDENTIFIER, &CookieOptions::default()).is_none());
        assert_eq!(jar.get(SESSION_IDENTIFIER).as_deref(), Some("id=abcde&rum=0&logs=1"));
    }

    #[test]
    fn builds_record_from_all_old_cookies() {
        let jar = jar();
        set(&jar, OLD_SESSION_IDENTIFIER, "abcde");
        set(&jar, OLD_LOGS_COOKIE_NAME, "1");
        set(&jar, OLD_RUM_COOKIE_NAME, "0");

        let migrated =
            try_old_cookies_migration(&jar, SESSION_IDENTIFIER, &CookieOptions::default()).unwrap();
        assert_eq!(migrated.id(), Some("abcde"));

        let raw = jar.get(SESSION_IDENTIFIER).unwrap();
        assert!(raw.contains("id=abcde"));
        assert!(raw.contains("rum=0"));
        assert!(raw.contains("logs=1"));
        assert!(raw.contains("expire="));
    }

    #[test]
    fn single_old_cookie() {
        let jar = jar();
        set(&jar, OLD_RUM_COOKIE_NAME, "0");

        try_old_cookies_migration(&jar, SESSION_IDENTIFIER, &CookieOptions::default());

        let raw = jar.get(SESSION_IDENTIFIER).unwrap();
        assert!(!raw.contains("id="));
        assert!(raw.contains("rum=0"));
    }

    #[test]
    fn invalid_flags_are_ignored() {
        let jar = jar();
        set(&jar, OLD_SESSION_IDENTIFIER, "abcde");
        set(&jar, OLD_LOGS_COOKIE_NAME, "2");
        set(&jar, OLD_RUM_COOKIE_NAME, "yes");

        let migrated =
            try_old_cookies_migration(&jar, SESSION_IDENTIFIER, &CookieOptions::default()).unwrap();
        assert_eq!(migrated.get(LOGS_SESSION_KEY), None);
        assert_eq!(migrated.get(RUM_SESSION_KEY), None);
        assert_eq!(migrated.id(), Some("abcde"));
    }

    #[test]
    fn nothing_to_migrate_stores_nothing() {
        let jar = jar();
        let migrated =
            try_old_cookies_migration(&jar, SESSION_IDENTIFIER, &CookieOptions::default()).unwrap();
        assert!(migrated.is_empty());
        assert!(jar.get(SESSION_IDENTIFIER).is_none());
    }

    #[test]
    fn custom_session_name() {
        let jar = jar();
        jar.set(OLD_SESSION_IDENTIFIER, "abc", Duration::from_secs(60), &CookieOptions::default());
        try_old_cookies_migration(&jar, "_app_s", &CookieOptions::default());
        assert!(jar.get("_app_s").unwrap().contains("id=abc"));
    }
}
