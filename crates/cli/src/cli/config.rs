use std::fmt;

use ts_domain::config::{Config, ConfigError, ConfigSeverity};

/// Outcome of `config validate` for one file.
#[derive(Debug)]
pub struct ValidationReport {
    pub path: String,
    pub issues: Vec<ConfigError>,
}

impl ValidationReport {
    pub fn errors(&self) -> usize {
        self.count(ConfigSeverity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(ConfigSeverity::Warning)
    }

    /// Warnings alone do not fail validation.
    pub fn is_ok(&self) -> bool {
        self.errors() == 0
    }

    fn count(&self, severity: ConfigSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Config OK ({})", self.path);
        }
        for issue in &self.issues {
            writeln!(f, "{issue}")?;
        }
        writeln!(
            f,
            "\n{} error(s), {} warning(s) in {}",
            self.errors(),
            self.warnings(),
            self.path
        )
    }
}

pub fn validate(config: &Config, config_path: &str) -> ValidationReport {
    ValidationReport {
        path: config_path.to_owned(),
        issues: config.validate(),
    }
}

/// Render the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
