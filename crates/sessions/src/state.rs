//! The flat session record shared by every tab.
//!
//! Keys are short lowercase words, values lowercase alphanumerics and
//! hyphens.  Three keys are reserved: `id`, `expire` (epoch milliseconds)
//! and `lock` (transient lock token).  Everything else is an opaque feature
//! flag that only needs to survive a round-trip.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::Serialize;

pub const ID_KEY: &str = "id";
pub const EXPIRE_KEY: &str = "expire";
pub const LOCK_KEY: &str = "lock";

/// A session record.  An empty record means "expired or absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SessionState(BTreeMap<String, String>);

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An empty record is the expired state: persisting it clears storage.
    pub fn is_expired(&self) -> bool {
        self.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn id(&self) -> Option<&str> {
        self.get(ID_KEY)
    }

    pub fn expire(&self) -> Option<&str> {
        self.get(EXPIRE_KEY)
    }

    /// `expire` as epoch milliseconds, if present and numeric.
    pub fn expire_at_ms(&self) -> Option<i64> {
        self.expire()?.parse().ok()
    }

    pub fn lock(&self) -> Option<&str> {
        self.get(LOCK_KEY)
    }

    /// True when `lock` is present and equal to `token`.
    pub fn is_locked_by(&self, token: &str) -> bool {
        self.lock() == Some(token)
    }

    pub fn set_lock(&mut self, token: impl Into<String>) {
        self.insert(LOCK_KEY, token);
    }

    pub fn clear_lock(&mut self) -> Option<String> {
        self.remove(LOCK_KEY)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a SessionState {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_expired() {
        assert!(SessionState::new().is_expired());
        assert!(!SessionState::new().with("id", "abc").is_expired());
    }

    #[test]
    fn lock_helpers() {
        let mut s = SessionState::new().with("id", "abc");
        assert!(s.lock().is_none());
        s.set_lock("tok-1");
        assert!(s.is_locked_by("tok-1"));
        assert!(!s.is_locked_by("tok-2"));
        assert_eq!(s.clear_lock().as_deref(), Some("tok-1"));
        assert!(s.lock().is_none());
    }

    #[test]
    fn expire_parses_as_millis() {
        let s = SessionState::new().with(EXPIRE_KEY, "1700000000000");
        assert_eq!(s.expire_at_ms(), Some(1_700_000_000_000));
        let bad = SessionState::new().with(EXPIRE_KEY, "soon");
        assert_eq!(bad.expire_at_ms(), None);
    }

    #[test]
    fn serializes_as_flat_object() {
        let s: SessionState = [("id", "abc"), ("rum", "1")].into_iter().collect();
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"id":"abc","rum":"1"}"#);
    }
}
