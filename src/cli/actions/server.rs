use crate::api::{
    self,
    handlers::auth::{
        AccessKeyResolver, AuthConfig, JwksResolver, SigningKeyMaterial, StaticKeyResolver,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fs, sync::Arc};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub private_key_path: String,
    pub public_key_path: Option<String>,
    pub key_id: Option<String>,
    pub jwks_url: Option<String>,
    pub refresh_secret: SecretString,
    pub token_issuer: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_days: i64,
    pub access_cookie_max_age_hours: i64,
    pub refresh_cookie_max_age_days: i64,
    pub cookie_domain: String,
    pub cookie_secure: bool,
    pub store_timeout_ms: u64,
    pub sweep_interval_seconds: u64,
    pub frontend_origin: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if key material cannot be loaded, the key set cannot be resolved, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let keys = Arc::new(load_key_material(&args)?);

    let access_keys: Arc<dyn AccessKeyResolver> = match &args.jwks_url {
        Some(url) => {
            info!("Verifying access tokens against remote key set {url}");
            Arc::new(JwksResolver::new(url.clone()).await?)
        }
        None => Arc::new(StaticKeyResolver::new(
            keys.access_verification_key()
                .context("Failed to derive access-token verification key")?,
        )),
    };

    let auth_config = AuthConfig::new(args.token_issuer, args.cookie_domain)
        .with_cookie_secure(args.cookie_secure)
        .with_access_token_ttl_hours(args.access_token_ttl_hours)
        .with_refresh_token_ttl_days(args.refresh_token_ttl_days)
        .with_access_cookie_max_age_hours(args.access_cookie_max_age_hours)
        .with_refresh_cookie_max_age_days(args.refresh_cookie_max_age_days)
        .with_store_timeout_ms(args.store_timeout_ms)
        .with_sweep_interval_seconds(args.sweep_interval_seconds);

    debug!("Auth config: {:?}", auth_config);

    api::new(
        args.port,
        args.dsn,
        auth_config,
        keys,
        access_keys,
        args.frontend_origin,
    )
    .await
}

fn load_key_material(args: &Args) -> Result<SigningKeyMaterial> {
    let private_key = fs::read(&args.private_key_path)
        .with_context(|| format!("Failed to read private key: {}", args.private_key_path))?;
    let public_key = args
        .public_key_path
        .as_ref()
        .map(|path| {
            fs::read(path).with_context(|| format!("Failed to read public key: {path}"))
        })
        .transpose()?;

    SigningKeyMaterial::new(
        &private_key,
        public_key.as_deref(),
        &args.refresh_secret,
        args.key_id.clone(),
    )
    .context("Invalid signing key material")
}
