mod lock;
mod observability;
mod storage;

pub use lock::*;
pub use observability::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for missing keys.
    pub fn load(path: &str) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        // Cookie names are RFC 6265 tokens; keep to a conservative subset.
        let name = &self.storage.session_cookie_name;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "storage.session_cookie_name".into(),
                message: format!("invalid session identifier {name:?}"),
            });
        }

        if self.storage.expiration_delay_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "storage.expiration_delay_ms".into(),
                message: "expiration delay must be greater than 0".into(),
            });
        }

        if self.lock.retry_delay_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "lock.retry_delay_ms".into(),
                message: "retry delay must be greater than 0".into(),
            });
        }

        if self.lock.max_retries == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "lock.max_retries".into(),
                message: "max_retries must be greater than 0".into(),
            });
        }

        // The lock only protects the cookie jar in practice; other backends
        // are per-origin or per-tab and do not race the same way.
        if self.lock.enabled && self.storage.kind != StorageKind::Cookie {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "lock.enabled".into(),
                message: format!(
                    "lock strategy enabled on {} storage",
                    self.storage.kind
                ),
            });
        }

        if self.storage.cookie.cross_site && !self.storage.cookie.secure {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "storage.cookie.cross_site".into(),
                message: "samesite=none cookies are rejected by browsers unless secure".into(),
            });
        }

        errors
    }
}
