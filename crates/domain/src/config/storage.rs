use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where and how the session record is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Name the session record is stored under (cookie name or storage key).
    #[serde(default = "d_session_cookie_name")]
    pub session_cookie_name: String,

    /// Lifetime of a persisted session record.  Every write pushes `expire`
    /// this far into the future.
    #[serde(default = "d_expiration_delay_ms")]
    pub expiration_delay_ms: u64,

    /// Storage medium for the session record.
    #[serde(default)]
    pub kind: StorageKind,

    /// Cookie attributes, only used by the cookie backend.
    #[serde(default)]
    pub cookie: CookieConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: d_session_cookie_name(),
            expiration_delay_ms: d_expiration_delay_ms(),
            kind: StorageKind::Cookie,
            cookie: CookieConfig::default(),
        }
    }
}

impl StorageConfig {
    pub fn expiration_delay(&self) -> Duration {
        Duration::from_millis(self.expiration_delay_ms)
    }
}

/// The closed set of storage media a session record can live in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Cookie,
    LocalStorage,
    SessionStorage,
    /// Single in-process string, lives as long as the application.
    Memory,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cookie => "cookie",
            Self::LocalStorage => "local_storage",
            Self::SessionStorage => "session_storage",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Cookie attributes.  `cross_site` switches `samesite=strict` to
/// `samesite=none`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub cross_site: bool,
    #[serde(default)]
    pub domain: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_session_cookie_name() -> String {
    "_dd_s".into()
}
fn d_expiration_delay_ms() -> u64 {
    15 * 60 * 1000
}
