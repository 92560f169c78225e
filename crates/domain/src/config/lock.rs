use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cross-tab lock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Optimistic cross-tab lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Wrap every read-modify-write in the lock protocol.  Only worth it on
    /// engines whose cookie writes race across tabs.
    #[serde(default = "d_true")]
    pub enabled: bool,

    /// Delay between two attempts of the same request.
    #[serde(default = "d_10")]
    pub retry_delay_ms: u64,

    /// Attempts before a request is silently dropped.
    #[serde(default = "d_100")]
    pub max_retries: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_delay_ms: 10,
            max_retries: 100,
        }
    }
}

impl LockConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Worst-case time a request can spend retrying before it is dropped.
    pub fn give_up_after(&self) -> Duration {
        self.retry_delay() * self.max_retries
    }
}

fn d_true() -> bool {
    true
}
fn d_10() -> u64 {
    10
}
fn d_100() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn give_up_after_is_delay_times_retries() {
        let cfg = LockConfig::default();
        assert_eq!(cfg.give_up_after(), Duration::from_millis(1000));
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg: LockConfig = toml::from_str("enabled = false").unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.retry_delay_ms, 10);
        assert_eq!(cfg.max_retries, 100);
    }
}
