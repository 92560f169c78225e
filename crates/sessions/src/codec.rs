//! Session string codec: `key1=value1&key2=value2`.
//!
//! Decoding never fails.  Input that does not look like a session string at
//! all (for instance an unrelated cookie that happens to share the name)
//! decodes to an empty record, and malformed entries inside an otherwise
//! valid string are dropped one by one.

use std::sync::OnceLock;

use regex::Regex;

use crate::state::SessionState;

const SESSION_ENTRY_SEPARATOR: &str = "&";

fn entry_regex() -> &'static Regex {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    ENTRY.get_or_init(|| {
        Regex::new(r"^([a-z]+)=([a-z0-9-]+)$").expect("session entry pattern is valid")
    })
}

/// Serialize a record.  An empty record encodes to `""`.
pub fn encode(session: &SessionState) -> String {
    session
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(SESSION_ENTRY_SEPARATOR)
}

/// Parse a stored session string.
pub fn decode(raw: Option<&str>) -> SessionState {
    let mut session = SessionState::new();
    let Some(raw) = raw else {
        return session;
    };
    if !is_valid_session_string(raw) {
        return session;
    }

    for entry in raw.split(SESSION_ENTRY_SEPARATOR) {
        if let Some(caps) = entry_regex().captures(entry) {
            session.insert(&caps[1], &caps[2]);
        }
    }
    session
}

/// The gate applied before splitting: the string must either contain the
/// separator or be a single well-formed entry.
pub fn is_valid_session_string(raw: &str) -> bool {
    raw.contains(SESSION_ENTRY_SEPARATOR) || entry_regex().is_match(raw)
}

/// Whether `key=value` would survive a decode.
pub fn is_valid_entry(key: &str, value: &str) -> bool {
    entry_regex().is_match(&format!("{key}={value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, &str)]) -> SessionState {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_and_absent_decode_to_empty() {
        assert!(decode(None).is_empty());
        assert!(decode(Some("")).is_empty());
    }

    #[test]
    fn empty_record_encodes_to_empty_string() {
        assert_eq!(encode(&SessionState::new()), "");
    }

    #[test]
    fn garbage_without_separator_is_rejected() {
        assert!(decode(Some("not-a-valid-entry")).is_empty());
        assert!(decode(Some("GA1.2.12345.67890")).is_empty());
    }

    #[test]
    fn encoded_entries_split_back_on_separator() {
        let raw = encode(&state(&[("id", "abc"), ("rum", "1"), ("logs", "0")]));
        assert_eq!(raw.split(SESSION_ENTRY_SEPARATOR).count(), 3);
        assert_eq!(raw, "id=abc&logs=0&rum=1");
    }

    #[test]
    fn single_entry_is_accepted() {
        assert_eq!(decode(Some("a=1")), state(&[("a", "1")]));
    }

    #[test]
    fn multiple_entries() {
        assert_eq!(decode(Some("a=1&b=2")), state(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn malformed_segments_are_dropped() {
        assert_eq!(decode(Some("a=1&!!!")), state(&[("a", "1")]));
        assert_eq!(
            decode(Some("id=abc&Upper=1&rum=2&x=&=y&logs=UP")),
            state(&[("id", "abc"), ("rum", "2")])
        );
    }

    #[test]
    fn separator_alone_passes_gate_but_yields_nothing() {
        assert!(is_valid_session_string("&"));
        assert!(decode(Some("&")).is_empty());
    }

    #[test]
    fn roundtrip_is_order_insensitive() {
        let s = state(&[
            ("id", "c9a5e2b0-1f2d-4b6a-9f0e-3c2d1b0a9f8e"),
            ("expire", "1700000000000"),
            ("rum", "1"),
            ("logs", "0"),
        ]);
        assert_eq!(decode(Some(&encode(&s))), s);
        let reordered = "rum=1&logs=0&expire=1700000000000&id=c9a5e2b0-1f2d-4b6a-9f0e-3c2d1b0a9f8e";
        assert_eq!(decode(Some(reordered)), s);
    }

    #[test]
    fn entry_validation() {
        assert!(is_valid_entry("rum", "1"));
        assert!(is_valid_entry("lock", "0f3e-aa"));
        assert!(!is_valid_entry("Rum", "1"));
        assert!(!is_valid_entry("rum", "A"));
        assert!(!is_valid_entry("rum", "1&logs=1"));
        assert!(!is_valid_entry("", "1"));
    }
}
