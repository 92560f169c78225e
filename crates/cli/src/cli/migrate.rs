//! `migrate` subcommand: run the legacy cookie migration on a scratch jar.

use std::sync::Arc;

use ts_domain::config::Config;
use ts_sessions::backend::{CookieAccessor, CookieOptions, InMemoryCookieJar};
use ts_sessions::migration::{
    try_old_cookies_migration, OLD_LOGS_COOKIE_NAME, OLD_RUM_COOKIE_NAME, OLD_SESSION_IDENTIFIER,
};

/// Seed the legacy cookies that were given, migrate, and return the stored
/// session cookie value (`None` when nothing was written).
pub fn run(
    config: &Config,
    id: Option<&str>,
    rum: Option<&str>,
    logs: Option<&str>,
) -> Option<String> {
    let options = CookieOptions::from(&config.storage.cookie);
    let jar: Arc<dyn CookieAccessor> = Arc::new(InMemoryCookieJar::new());
    let lifetime = config.storage.expiration_delay();

    for (name, value) in [
        (OLD_SESSION_IDENTIFIER, id),
        (OLD_RUM_COOKIE_NAME, rum),
        (OLD_LOGS_COOKIE_NAME, logs),
    ] {
        if let Some(value) = value {
            jar.set(name, value, lifetime, &options);
        }
    }

    let name = &config.storage.session_cookie_name;
    let migrated = try_old_cookies_migration(&jar, name, &options);
    tracing::info!(
        keys = migrated.as_ref().map(|s| s.len()).unwrap_or(0),
        "legacy cookie migration finished"
    );
    jar.get(name)
}
