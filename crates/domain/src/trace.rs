use serde::Serialize;

/// Structured trace events emitted across all TabSession crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RequestQueued {
        queued: usize,
    },
    LockContention {
        storage: String,
        checkpoint: String,
        attempt: u32,
    },
    LockRetriesExhausted {
        storage: String,
        attempts: u32,
    },
    SessionPersisted {
        storage: String,
        keys: usize,
    },
    SessionCleared {
        storage: String,
    },
    LegacyCookiesMigrated {
        had_id: bool,
        had_rum: bool,
        had_logs: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ts_event");
    }
}
