//! Verification keys for access tokens.
//!
//! The authentication gate does not care where its key comes from. A static key is the public
//! half of our own signing key (or a configured PEM). The remote resolver pulls a JWK set over
//! HTTP, caches it, and refreshes on a stale cache or an unknown `kid`.
//!
//! Every remote fetch after startup goes through [`JwksResolver::refresh_throttled`]: one
//! caller at a time, and at most one attempt per cooldown window whether the attempt succeeds
//! or fails. Requests that lose the race keep using the cached set.

use super::keys::{Jwks, KeyMaterialError};
use super::utils::now_unix_seconds_u64;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use reqwest::{
    header::{ETAG, IF_NONE_MATCH},
    Client, StatusCode,
};
use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, info_span, warn, Instrument};
use url::{Host, Url};

const JWKS_CACHE_TTL_SECONDS: u64 = 300;
const JWKS_REFRESH_COOLDOWN_SECONDS: u64 = 30;
const JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum KeyResolveError {
    #[error("no verification key for kid {0:?}")]
    UnknownKey(Option<String>),
    #[error(transparent)]
    Key(#[from] KeyMaterialError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    Ok,
    Error,
    Static,
}

impl DependencyStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Static => "static",
        }
    }

    #[must_use]
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::Error)
    }
}

#[async_trait]
pub trait AccessKeyResolver: Send + Sync {
    /// Key used to verify a token whose header names `kid`.
    async fn resolve(&self, kid: Option<&str>) -> Result<DecodingKey, KeyResolveError>;

    /// Health of whatever backs the keys.
    async fn dependency_status(&self) -> DependencyStatus;
}

/// A single fixed key; the `kid` is ignored.
pub struct StaticKeyResolver {
    key: DecodingKey,
}

impl StaticKeyResolver {
    #[must_use]
    pub fn new(key: DecodingKey) -> Self {
        Self { key }
    }
}

impl fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl AccessKeyResolver for StaticKeyResolver {
    async fn resolve(&self, _kid: Option<&str>) -> Result<DecodingKey, KeyResolveError> {
        Ok(self.key.clone())
    }

    async fn dependency_status(&self) -> DependencyStatus {
        DependencyStatus::Static
    }
}

/// Last key set served by the endpoint.
#[derive(Debug, Clone)]
struct JwksCache {
    jwks: Jwks,
    /// Time of the last 200 or 304; drives the TTL.
    fetched_at: Instant,
    /// Sent back as `If-None-Match`.
    etag: Option<String>,
}

impl JwksCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < Duration::from_secs(JWKS_CACHE_TTL_SECONDS)
    }
}

/// Remote key set with a TTL cache and a throttled refresher.
#[derive(Debug)]
pub struct JwksResolver {
    url: String,
    client: Client,
    cache: RwLock<JwksCache>,
    /// Held for the duration of a fetch; callers that cannot take it skip the fetch.
    refresher: Mutex<()>,
    /// Unix time of the last fetch attempt, successful or not.
    last_attempt_unix: AtomicU64,
    /// Whether the last fetch attempt succeeded.
    last_attempt_ok: AtomicBool,
}

impl JwksResolver {
    /// Build a resolver for `url` and try one fetch.
    ///
    /// A failed startup fetch is not fatal: the cache starts empty and stale, so tokens are
    /// rejected until a later refresh succeeds.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid, not https (loopback excepted), or the client
    /// cannot be built.
    pub async fn new(url: String) -> Result<Self> {
        let parsed = Url::parse(&url).context("Invalid JWKS URL")?;
        if parsed.scheme() != "https" && !is_loopback(&parsed) {
            return Err(anyhow!("JWKS URL must use https: {url}"));
        }

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(JWKS_FETCH_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build JWKS HTTP client")?;

        let resolver = Self {
            url,
            client,
            cache: RwLock::new(JwksCache {
                jwks: Jwks { keys: Vec::new() },
                fetched_at: stale_instant(),
                etag: None,
            }),
            refresher: Mutex::new(()),
            last_attempt_unix: AtomicU64::new(now_unix_seconds_u64()),
            last_attempt_ok: AtomicBool::new(false),
        };

        let startup = resolver.refresh().await;
        resolver
            .last_attempt_ok
            .store(startup.is_ok(), Ordering::Relaxed);
        if let Err(err) = startup {
            warn!(
                url = %resolver.url,
                error = %err,
                "JWKS fetch failed during startup; continuing with empty key set"
            );
        }

        Ok(resolver)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Key set snapshot. A stale cache triggers a throttled refresh; whatever is cached
    /// afterwards is returned, even if that refresh was skipped or failed.
    async fn snapshot(&self) -> Jwks {
        let fresh = self.cache.read().await.is_fresh();
        if !fresh {
            if let Err(err) = self.refresh_throttled().await {
                warn!(url = %self.url, error = %err, "failed to refresh JWKS cache");
            }
        }
        self.cache.read().await.jwks.clone()
    }

    /// Fetch unless another caller is already fetching or the last attempt is inside the
    /// cooldown window. Returns whether a fetch ran and succeeded.
    async fn refresh_throttled(&self) -> Result<bool> {
        let Ok(_guard) = self.refresher.try_lock() else {
            return Ok(false);
        };
        let now = now_unix_seconds_u64();
        let last = self.last_attempt_unix.load(Ordering::Relaxed);
        if now.saturating_sub(last) < JWKS_REFRESH_COOLDOWN_SECONDS {
            return Ok(false);
        }
        self.last_attempt_unix.store(now, Ordering::Relaxed);

        let result = self.refresh().await;
        self.last_attempt_ok.store(result.is_ok(), Ordering::Relaxed);
        result.map(|()| true)
    }

    async fn refresh(&self) -> Result<()> {
        let etag = self.cache.read().await.etag.clone();
        match fetch_jwks(&self.client, &self.url, etag.as_deref()).await? {
            FetchOutcome::NotModified => {
                self.cache.write().await.fetched_at = Instant::now();
            }
            FetchOutcome::Updated { jwks, etag } => {
                let mut cache = self.cache.write().await;
                cache.jwks = jwks;
                cache.fetched_at = Instant::now();
                cache.etag = etag;
                info!(jwks_keys = cache.jwks.keys.len(), "JWKS cache refreshed");
            }
        }
        Ok(())
    }

    fn decoding_key(jwks: &Jwks, kid: Option<&str>) -> Option<Result<DecodingKey, KeyResolveError>> {
        jwks.select(kid)
            .filter(|jwk| jwk.is_rs256_signing_key())
            .map(|jwk| jwk.decoding_key().map_err(KeyResolveError::from))
    }
}

#[async_trait]
impl AccessKeyResolver for JwksResolver {
    async fn resolve(&self, kid: Option<&str>) -> Result<DecodingKey, KeyResolveError> {
        let jwks = self.snapshot().await;
        if let Some(found) = Self::decoding_key(&jwks, kid) {
            return found;
        }

        match self.refresh_throttled().await {
            Ok(true) => {
                let jwks = self.cache.read().await.jwks.clone();
                Self::decoding_key(&jwks, kid)
                    .unwrap_or_else(|| Err(KeyResolveError::UnknownKey(kid.map(str::to_string))))
            }
            Ok(false) => Err(KeyResolveError::UnknownKey(kid.map(str::to_string))),
            Err(err) => {
                warn!(url = %self.url, error = %err, "JWKS refresh on unknown kid failed");
                Err(KeyResolveError::UnknownKey(kid.map(str::to_string)))
            }
        }
    }

    /// Reports the last fetch outcome; a stale cache gets the same throttled refresh as
    /// token verification.
    async fn dependency_status(&self) -> DependencyStatus {
        let jwks = self.snapshot().await;
        if self.last_attempt_ok.load(Ordering::Relaxed) && !jwks.keys.is_empty() {
            DependencyStatus::Ok
        } else {
            DependencyStatus::Error
        }
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => domain == "localhost",
        None => false,
    }
}

/// An `Instant` old enough that the cache is stale on first use.
fn stale_instant() -> Instant {
    Instant::now()
        .checked_sub(Duration::from_secs(JWKS_CACHE_TTL_SECONDS + 1))
        .unwrap_or_else(Instant::now)
}

enum FetchOutcome {
    NotModified,
    Updated { jwks: Jwks, etag: Option<String> },
}

async fn fetch_jwks(client: &Client, url: &str, etag: Option<&str>) -> Result<FetchOutcome> {
    let span = info_span!("jwks.fetch", http.method = "GET", url = %url);
    async {
        let mut request = client.get(url);
        if let Some(etag_value) = etag {
            request = request.header(IF_NONE_MATCH, etag_value);
        }
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(anyhow!("JWKS fetch failed: {status}"));
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let jwks = response
            .json::<Jwks>()
            .await
            .context("Invalid JWKS JSON")?;
        Ok(FetchOutcome::Updated { jwks, etag })
    }
    .instrument(span)
    .await
}
