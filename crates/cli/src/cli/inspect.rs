//! `decode` / `encode` subcommands.

use anyhow::bail;

use ts_sessions::codec;
use ts_sessions::SessionState;

/// Decode `raw` into pretty JSON.  Garbage decodes to `{}`, same as the
/// SDK would see it.
pub fn decode(raw: &str) -> anyhow::Result<String> {
    let session = codec::decode(Some(raw));
    Ok(serde_json::to_string_pretty(&session)?)
}

/// Build a session string from `key=value` arguments.
pub fn encode(entries: &[String]) -> anyhow::Result<String> {
    let mut session = SessionState::new();
    for entry in entries {
        let (key, value) = parse_entry(entry)?;
        session.insert(key, value);
    }
    Ok(codec::encode(&session))
}

/// Split and validate one `key=value` argument.
pub fn parse_entry(entry: &str) -> anyhow::Result<(&str, &str)> {
    let Some((key, value)) = entry.split_once('=') else {
        bail!("expected key=value, got {entry:?}");
    };
    if !codec::is_valid_entry(key, value) {
        bail!("{entry:?} is not a valid session entry (keys [a-z]+, values [a-z0-9-]+)");
    }
    Ok((key, value))
}
