use crate::api::handlers::auth::REFRESH_RECORD_TTL_SECONDS;
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};

pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";

/// A refresh token must expire before the record that backs it.
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = REFRESH_RECORD_TTL_SECONDS / (24 * 60 * 60);

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_cookie_args(command);
    with_store_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer (iss) placed in and required of every token")
                .env("MECOM_AUTH_TOKEN_ISSUER")
                .required(true),
        )
        .arg(
            Arg::new("access-token-ttl-hours")
                .long("access-token-ttl-hours")
                .help("Access token lifetime in hours")
                .env("MECOM_AUTH_ACCESS_TOKEN_TTL_HOURS")
                .default_value("1")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("refresh-token-ttl-days")
                .long("refresh-token-ttl-days")
                .help("Refresh token lifetime in days (at most 365)")
                .env("MECOM_AUTH_REFRESH_TOKEN_TTL_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_REFRESH_TOKEN_TTL_DAYS)),
        )
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Domain attribute of the token cookies")
                .env("MECOM_AUTH_COOKIE_DOMAIN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark token cookies Secure; disable only for plain-HTTP development")
                .env("MECOM_AUTH_COOKIE_SECURE")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new("access-cookie-max-age-hours")
                .long("access-cookie-max-age-hours")
                .help("Max-Age of the access token cookie in hours")
                .env("MECOM_AUTH_ACCESS_COOKIE_MAX_AGE_HOURS")
                .default_value("1")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new("refresh-cookie-max-age-days")
                .long("refresh-cookie-max-age-days")
                .help("Max-Age of the refresh token cookie in days")
                .env("MECOM_AUTH_REFRESH_COOKIE_MAX_AGE_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long(ARG_FRONTEND_ORIGIN)
                .help("Origin allowed to call the API with credentials (CORS)")
                .env("MECOM_AUTH_FRONTEND_ORIGIN"),
        )
}

fn with_store_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("store-timeout-ms")
                .long("store-timeout-ms")
                .help("Upper bound for a single credential store call, in milliseconds")
                .env("MECOM_AUTH_STORE_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("sweep-interval-seconds")
                .long("sweep-interval-seconds")
                .help("Interval between expired refresh record sweeps; 0 disables the sweeper")
                .env("MECOM_AUTH_SWEEP_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub token_issuer: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_days: i64,
    pub cookie_domain: String,
    pub cookie_secure: bool,
    pub access_cookie_max_age_hours: i64,
    pub refresh_cookie_max_age_days: i64,
    pub frontend_origin: Option<String>,
    pub store_timeout_ms: u64,
    pub sweep_interval_seconds: u64,
}

impl Options {
    /// Parse auth options from CLI matches.
    ///
    /// # Errors
    /// Returns an error if the issuer or cookie domain is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let token_issuer = matches
            .get_one::<String>(ARG_TOKEN_ISSUER)
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_TOKEN_ISSUER}"))?;
        let cookie_domain = matches
            .get_one::<String>(ARG_COOKIE_DOMAIN)
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_COOKIE_DOMAIN}"))?;

        Ok(Self {
            token_issuer,
            access_token_ttl_hours: matches
                .get_one::<i64>("access-token-ttl-hours")
                .copied()
                .unwrap_or(1),
            refresh_token_ttl_days: matches
                .get_one::<i64>("refresh-token-ttl-days")
                .copied()
                .unwrap_or(7),
            cookie_domain,
            cookie_secure: matches
                .get_one::<bool>(ARG_COOKIE_SECURE)
                .copied()
                .unwrap_or(true),
            access_cookie_max_age_hours: matches
                .get_one::<i64>("access-cookie-max-age-hours")
                .copied()
                .unwrap_or(1),
            refresh_cookie_max_age_days: matches
                .get_one::<i64>("refresh-cookie-max-age-days")
                .copied()
                .unwrap_or(7),
            frontend_origin: matches.get_one::<String>(ARG_FRONTEND_ORIGIN).cloned(),
            store_timeout_ms: matches
                .get_one::<u64>("store-timeout-ms")
                .copied()
                .unwrap_or(3_000),
            sweep_interval_seconds: matches
                .get_one::<u64>("sweep-interval-seconds")
                .copied()
                .unwrap_or(3_600),
        })
    }
}
