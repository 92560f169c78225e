//! Storage backends for the session record.
//!
//! The raw get/set/delete primitives live behind [`CookieAccessor`] and
//! [`KeyValueStore`]; [`StorageBackend`] binds one of them to the session
//! name and exposes the uniform read/write/remove used by persistence.
//! Backend kinds form a closed enum, so there is no "unknown kind" path.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use ts_domain::config::{CookieConfig, StorageConfig, StorageKind};

/// Default name of the session record.
pub const SESSION_IDENTIFIER: &str = "_dd_s";

/// Default lifetime of a persisted session record (15 minutes).
pub const SESSION_EXPIRATION_DELAY: Duration = Duration::from_secs(15 * 60);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Accessor traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cookie get/set primitive.  A zero `expire_in` deletes the cookie.
pub trait CookieAccessor: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str, expire_in: Duration, options: &CookieOptions);
}

/// Web-storage style primitive (local storage, session storage).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str);
    fn remove(&self, name: &str);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cookie options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cookie attributes passed through to the cookie accessor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub secure: bool,
    pub cross_site: bool,
    pub domain: Option<String>,
}

impl CookieOptions {
    /// Render a `document.cookie` assignment:
    /// `name=value;expires=<date>;path=/;samesite=strict[;domain=d][;secure]`.
    pub fn render(&self, name: &str, value: &str, expire_in: Duration, now: DateTime<Utc>) -> String {
        let expire_in = chrono::Duration::from_std(expire_in).unwrap_or(chrono::Duration::zero());
        let expires = (now + expire_in).format("%a, %d %b %Y %H:%M:%S GMT");
        let same_site = if self.cross_site { "none" } else { "strict" };
        let domain = self
            .domain
            .as_deref()
            .map(|d| format!(";domain={d}"))
            .unwrap_or_default();
        let secure = if self.secure { ";secure" } else { "" };
        format!("{name}={value};expires={expires};path=/;samesite={same_site}{domain}{secure}")
    }
}

impl From<&CookieConfig> for CookieOptions {
    fn from(cfg: &CookieConfig) -> Self {
        Self {
            secure: cfg.secure,
            cross_site: cfg.cross_site,
            domain: cfg.domain.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory slot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single shared string.  Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot(Arc<Mutex<String>>);

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot: lives as long as the application and is only
    /// reset by an explicit clear.
    pub fn process() -> Self {
        static PROCESS_SLOT: OnceLock<MemorySlot> = OnceLock::new();
        PROCESS_SLOT.get_or_init(MemorySlot::new).clone()
    }

    pub fn get(&self) -> Option<String> {
        let value = self.0.lock();
        (!value.is_empty()).then(|| value.clone())
    }

    pub fn set(&self, value: &str) {
        *self.0.lock() = value.to_owned();
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
enum Medium {
    Cookie(Arc<dyn CookieAccessor>),
    LocalStorage(Arc<dyn KeyValueStore>),
    SessionStorage(Arc<dyn KeyValueStore>),
    Memory(MemorySlot),
}

/// One storage medium bound to the session record name.
#[derive(Clone)]
pub struct StorageBackend {
    medium: Medium,
    name: Arc<str>,
    expiration_delay: Duration,
}

impl StorageBackend {
    fn with_medium(medium: Medium) -> Self {
        Self {
            medium,
            name: Arc::from(SESSION_IDENTIFIER),
            expiration_delay: SESSION_EXPIRATION_DELAY,
        }
    }

    pub fn cookie(jar: Arc<dyn CookieAccessor>) -> Self {
        Self::with_medium(Medium::Cookie(jar))
    }

    pub fn local_storage(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_medium(Medium::LocalStorage(store))
    }

    pub fn session_storage(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_medium(Medium::SessionStorage(store))
    }

    pub fn memory(slot: MemorySlot) -> Self {
        Self::with_medium(Medium::Memory(slot))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    pub fn with_expiration_delay(mut self, delay: Duration) -> Self {
        self.expiration_delay = delay;
        self
    }

    /// Apply the name and expiration delay from configuration.
    pub fn configured(self, cfg: &StorageConfig) -> Self {
        self.with_name(&cfg.session_cookie_name)
            .with_expiration_delay(cfg.expiration_delay())
    }

    pub fn kind(&self) -> StorageKind {
        match self.medium {
            Medium::Cookie(_) => StorageKind::Cookie,
            Medium::LocalStorage(_) => StorageKind::LocalStorage,
            Medium::SessionStorage(_) => StorageKind::SessionStorage,
            Medium::Memory(_) => StorageKind::Memory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expiration_delay(&self) -> Duration {
        self.expiration_delay
    }

    pub fn read(&self) -> Option<String> {
        match &self.medium {
            Medium::Cookie(jar) => jar.get(&self.name),
            Medium::LocalStorage(store) | Medium::SessionStorage(store) => store.get(&self.name),
            Medium::Memory(slot) => slot.get(),
        }
    }

    pub fn write(&self, raw: &str, options: &CookieOptions) {
        match &self.medium {
            Medium::Cookie(jar) => jar.set(&self.name, raw, self.expiration_delay, options),
            Medium::LocalStorage(store) | Medium::SessionStorage(store) => {
                store.set(&self.name, raw)
            }
            Medium::Memory(slot) => slot.set(raw),
        }
    }

    pub fn remove(&self, options: &CookieOptions) {
        match &self.medium {
            Medium::Cookie(jar) => jar.set(&self.name, "", Duration::ZERO, options),
            Medium::LocalStorage(store) | Medium::SessionStorage(store) => {
                store.remove(&self.name)
            }
            Medium::Memory(slot) => slot.clear(),
        }
    }
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBackend")
            .field("kind", &self.kind())
            .field("name", &self.name)
            .field("expiration_delay", &self.expiration_delay)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-process accessors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cookie jar kept in memory.  Honours expiry; several coordinators sharing
/// one jar behave like tabs sharing the browser's cookie store.
#[derive(Debug, Default)]
pub struct InMemoryCookieJar {
    cookies: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl InMemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) cookies.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.cookies
            .lock()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieAccessor for InMemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let now = Utc::now();
        let mut cookies = self.cookies.lock();
        match cookies.get(name) {
            Some((value, expires)) if *expires > now => Some(value.clone()),
            Some(_) => {
                cookies.remove(name);
                None
            }
            None => None,
        }
    }

    fn set(&self, name: &str, value: &str, expire_in: Duration, options: &CookieOptions) {
        let now = Utc::now();
        tracing::trace!(cookie = %options.render(name, value, expire_in, now), "set cookie");

        let mut cookies = self.cookies.lock();
        if expire_in.is_zero() {
            cookies.remove(name);
            return;
        }
        let expires = chrono::Duration::from_std(expire_in)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        cookies.insert(name.to_owned(), (value.to_owned(), expires));
    }
}

/// Key-value store kept in memory (stand-in for local/session storage).
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, name: &str) -> Option<String> {
        self.items.lock().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) {
        self.items.lock().insert(name.to_owned(), value.to_owned());
    }

    fn remove(&self, name: &str) {
        self.items.lock().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn render_default_options() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let cookie = CookieOptions::default().render("_dd_s", "id=abc", Duration::from_secs(60), now);
        assert_eq!(
            cookie,
            "_dd_s=id=abc;expires=Thu, 15 Jan 2026 10:01:00 GMT;path=/;samesite=strict"
        );
    }

    #[test]
    fn render_cross_site_secure_domain() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let options = CookieOptions {
            secure: true,
            cross_site: true,
            domain: Some("example.com".into()),
        };
        let cookie = options.render("_dd_s", "", Duration::ZERO, now);
        assert_eq!(
            cookie,
            "_dd_s=;expires=Thu, 15 Jan 2026 10:00:00 GMT;path=/;samesite=none;domain=example.com;secure"
        );
    }

    #[test]
    fn cookie_backend_roundtrip_and_remove() {
        let jar = Arc::new(InMemoryCookieJar::new());
        let backend = StorageBackend::cookie(jar.clone());
        assert_eq!(backend.kind(), StorageKind::Cookie);
        assert!(backend.read().is_none());

        backend.write("id=abc", &CookieOptions::default());
        assert_eq!(backend.read().as_deref(), Some("id=abc"));
        assert_eq!(jar.get(SESSION_IDENTIFIER).as_deref(), Some("id=abc"));

        backend.remove(&CookieOptions::default());
        assert!(backend.read().is_none());
        assert!(jar.is_empty());
    }

    #[test]
    fn local_and_session_storage_are_separate() {
        let local = Arc::new(InMemoryKeyValueStore::new());
        let session = Arc::new(InMemoryKeyValueStore::new());
        let a = StorageBackend::local_storage(local);
        let b = StorageBackend::session_storage(session);
        a.write("id=a", &CookieOptions::default());
        assert_eq!(a.read().as_deref(), Some("id=a"));
        assert!(b.read().is_none());
        assert_eq!(b.kind(), StorageKind::SessionStorage);

        a.remove(&CookieOptions::default());
        assert!(a.read().is_none());
    }

    #[test]
    fn memory_slot_is_shared_between_clones() {
        let slot = MemorySlot::new();
        let backend = StorageBackend::memory(slot.clone());
        backend.write("id=m", &CookieOptions::default());
        assert_eq!(slot.get().as_deref(), Some("id=m"));
        backend.remove(&CookieOptions::default());
        assert!(slot.get().is_none());
    }

    #[test]
    fn process_slot_is_a_singleton() {
        let a = MemorySlot::process();
        let b = MemorySlot::process();
        a.set("id=proc");
        assert_eq!(b.get().as_deref(), Some("id=proc"));
        a.clear();
        assert!(b.get().is_none());
    }

    #[test]
    fn configured_name_is_used() {
        let jar = Arc::new(InMemoryCookieJar::new());
        let cfg = StorageConfig {
            session_cookie_name: "_app_s".into(),
            ..Default::default()
        };
        let backend = StorageBackend::cookie(jar.clone()).configured(&cfg);
        backend.write("id=x", &CookieOptions::default());
        assert_eq!(jar.get("_app_s").as_deref(), Some("id=x"));
        assert!(jar.get(SESSION_IDENTIFIER).is_none());
    }
}
