use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_PRIVATE_KEY: &str = "private-key";
pub const ARG_PUBLIC_KEY: &str = "public-key";
pub const ARG_KEY_ID: &str = "key-id";
pub const ARG_JWKS_URL: &str = "jwks-url";
pub const ARG_REFRESH_SECRET: &str = "refresh-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PRIVATE_KEY)
                .long(ARG_PRIVATE_KEY)
                .help("Path to the RSA private key (PEM, PKCS#1 or PKCS#8) that signs access tokens")
                .env("MECOM_AUTH_PRIVATE_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PUBLIC_KEY)
                .long(ARG_PUBLIC_KEY)
                .help("Path to the matching RSA public key; derived from the private key when absent")
                .env("MECOM_AUTH_PUBLIC_KEY"),
        )
        .arg(
            Arg::new(ARG_KEY_ID)
                .long(ARG_KEY_ID)
                .help("Key id placed in the access token header and the published JWKS")
                .env("MECOM_AUTH_KEY_ID"),
        )
        .arg(
            Arg::new(ARG_JWKS_URL)
                .long(ARG_JWKS_URL)
                .help("Verify access tokens against this JWKS URL instead of the local public key")
                .env("MECOM_AUTH_JWKS_URL"),
        )
        .arg(
            Arg::new(ARG_REFRESH_SECRET)
                .long(ARG_REFRESH_SECRET)
                .help("HMAC secret for refresh tokens")
                .env("MECOM_AUTH_REFRESH_SECRET")
                .hide_env_values(true)
                .required(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub private_key_path: String,
    pub public_key_path: Option<String>,
    pub key_id: Option<String>,
    pub jwks_url: Option<String>,
    pub refresh_secret: SecretString,
}

impl Options {
    /// Parse key options from CLI matches.
    ///
    /// # Errors
    /// Returns an error if the private key path or the refresh secret is missing or empty.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let private_key_path = matches
            .get_one::<String>(ARG_PRIVATE_KEY)
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_PRIVATE_KEY}"))?;
        let refresh_secret = matches
            .get_one::<String>(ARG_REFRESH_SECRET)
            .filter(|secret| !secret.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_REFRESH_SECRET}"))?;

        Ok(Self {
            private_key_path,
            public_key_path: matches.get_one::<String>(ARG_PUBLIC_KEY).cloned(),
            key_id: matches.get_one::<String>(ARG_KEY_ID).cloned(),
            jwks_url: matches.get_one::<String>(ARG_JWKS_URL).cloned(),
            refresh_secret: SecretString::from(refresh_secret),
        })
    }
}
