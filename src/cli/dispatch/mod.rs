//! Maps parsed CLI arguments to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, keys};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let key_opts = keys::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        private_key_path: key_opts.private_key_path,
        public_key_path: key_opts.public_key_path,
        key_id: key_opts.key_id,
        jwks_url: key_opts.jwks_url,
        refresh_secret: key_opts.refresh_secret,
        token_issuer: auth_opts.token_issuer,
        access_token_ttl_hours: auth_opts.access_token_ttl_hours,
        refresh_token_ttl_days: auth_opts.refresh_token_ttl_days,
        access_cookie_max_age_hours: auth_opts.access_cookie_max_age_hours,
        refresh_cookie_max_age_days: auth_opts.refresh_cookie_max_age_days,
        cookie_domain: auth_opts.cookie_domain,
        cookie_secure: auth_opts.cookie_secure,
        store_timeout_ms: auth_opts.store_timeout_ms,
        sweep_interval_seconds: auth_opts.sweep_interval_seconds,
        frontend_origin: auth_opts.frontend_origin,
    }))
}
