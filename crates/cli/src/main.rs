use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ts_cli::cli::{self, Cli, Command, ConfigCommand};
use ts_domain::config::{LogFormat, ObservabilityConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let (config, config_path) = cli::load_config(args.config_path.as_deref())?;
    init_tracing(&config.observability);

    match args.command {
        Command::Decode { raw } => {
            println!("{}", cli::inspect::decode(&raw)?);
            Ok(())
        }
        Command::Encode { entries } => {
            println!("{}", cli::inspect::encode(&entries)?);
            Ok(())
        }
        Command::Simulate {
            tabs,
            increments,
            no_lock,
            json,
        } => {
            let report = cli::simulate::run(&config, tabs, increments, !no_lock)
                .await
                .context("running simulation")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "storage={} tabs={} increments={} lock={}",
                    report.storage,
                    report.tabs, report.increments, report.lock_enabled
                );
                println!(
                    "expected={} final={} completed={} lost={}",
                    report.expected,
                    report.final_count,
                    report.completed,
                    report.lost_updates()
                );
            }
            Ok(())
        }
        Command::Migrate { id, rum, logs } => {
            match cli::migrate::run(&config, id.as_deref(), rum.as_deref(), logs.as_deref()) {
                Some(cookie) => println!("{}={cookie}", config.storage.session_cookie_name),
                None => println!("no session written"),
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let report = cli::config::validate(&config, &config_path);
            print!("{report}");
            if !report.is_ok() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            print!("{}", cli::config::show(&config)?);
            Ok(())
        }
        Command::Version => {
            println!("tabsession {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Install the stderr subscriber.  `RUST_LOG` overrides the configured filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.filter));

    match obs.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .compact()
            .init(),
    }
}
