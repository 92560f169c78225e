pub mod config;
pub mod inspect;
pub mod migrate;
pub mod simulate;

use anyhow::Context;
use clap::{Parser, Subcommand};

/// TabSession: cross-tab session record tooling.
#[derive(Debug, Parser)]
#[command(name = "tabsession", version, about)]
pub struct Cli {
    /// Config file (overrides `TS_CONFIG`).
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode a stored session string and print it as JSON.
    Decode {
        /// Raw value, e.g. `id=abc&rum=1&expire=1700000000000`.
        raw: String,
    },
    /// Encode `key=value` pairs into a session string.
    Encode {
        /// Entries such as `id=abc rum=1`.
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Run several simulated tabs against one shared cookie jar.
    Simulate {
        /// Number of tabs (one coordinator each).
        #[arg(long, default_value_t = 4)]
        tabs: usize,
        /// Counter increments submitted by every tab.
        #[arg(long, default_value_t = 25)]
        increments: usize,
        /// Disable the cross-tab lock to compare lost updates.
        #[arg(long)]
        no_lock: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Fold legacy session cookies into a current-format record.
    Migrate {
        /// Legacy session id cookie value.
        #[arg(long)]
        id: Option<String>,
        /// Legacy RUM cookie value (0, 1 or 2).
        #[arg(long)]
        rum: Option<String>,
        /// Legacy logs cookie value (0 or 1).
        #[arg(long)]
        logs: Option<String>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the config file and report issues.
    Validate,
    /// Print the resolved config (defaults filled in) as TOML.
    Show,
}

/// Env var naming the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "TS_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "tabsession.toml";

/// Resolve the config path (`--config`, then `TS_CONFIG`, then
/// `tabsession.toml`) and load it.  A missing file yields defaults; a file
/// that exists but does not parse is an error.
pub fn load_config(
    explicit: Option<&str>,
) -> anyhow::Result<(ts_domain::config::Config, String)> {
    let config_path = match explicit {
        Some(path) => path.to_owned(),
        None => std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()),
    };

    if explicit.is_none() && !std::path::Path::new(&config_path).exists() {
        return Ok((ts_domain::config::Config::default(), config_path));
    }

    let config = ts_domain::config::Config::load(&config_path)
        .with_context(|| format!("loading config from {config_path}"))?;
    Ok((config, config_path))
}
