//! Auth configuration: token lifetimes, cookie attributes and store limits.

use std::time::Duration;

pub const DEFAULT_ACCESS_TOKEN_TTL_HOURS: i64 = 1;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
pub const DEFAULT_ACCESS_COOKIE_MAX_AGE_HOURS: i64 = 1;
pub const DEFAULT_REFRESH_COOKIE_MAX_AGE_DAYS: i64 = 7;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_issuer: String,
    cookie_domain: String,
    cookie_secure: bool,
    access_token_ttl_hours: i64,
    refresh_token_ttl_days: i64,
    access_cookie_max_age_hours: i64,
    refresh_cookie_max_age_days: i64,
    store_timeout_ms: u64,
    sweep_interval_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_issuer: impl Into<String>, cookie_domain: impl Into<String>) -> Self {
        Self {
            token_issuer: token_issuer.into(),
            cookie_domain: cookie_domain.into(),
            cookie_secure: true,
            access_token_ttl_hours: DEFAULT_ACCESS_TOKEN_TTL_HOURS,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            access_cookie_max_age_hours: DEFAULT_ACCESS_COOKIE_MAX_AGE_HOURS,
            refresh_cookie_max_age_days: DEFAULT_REFRESH_COOKIE_MAX_AGE_DAYS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }

    /// Only turn this off for plain-HTTP local development.
    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_hours(mut self, hours: i64) -> Self {
        self.access_token_ttl_hours = hours;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_access_cookie_max_age_hours(mut self, hours: i64) -> Self {
        self.access_cookie_max_age_hours = hours;
        self
    }

    #[must_use]
    pub fn with_refresh_cookie_max_age_days(mut self, days: i64) -> Self {
        self.refresh_cookie_max_age_days = days;
        self
    }

    #[must_use]
    pub fn with_store_timeout_ms(mut self, millis: u64) -> Self {
        self.store_timeout_ms = millis;
        self
    }

    /// Zero disables the expired-record sweeper.
    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn token_issuer(&self) -> &str {
        &self.token_issuer
    }

    #[must_use]
    pub fn cookie_domain(&self) -> &str {
        &self.cookie_domain
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn access_token_ttl_hours(&self) -> i64 {
        self.access_token_ttl_hours
    }

    #[must_use]
    pub fn refresh_token_ttl_days(&self) -> i64 {
        self.refresh_token_ttl_days
    }

    #[must_use]
    pub fn access_cookie_max_age_seconds(&self) -> i64 {
        self.access_cookie_max_age_hours.saturating_mul(60 * 60)
    }

    #[must_use]
    pub fn refresh_cookie_max_age_seconds(&self) -> i64 {
        self.refresh_cookie_max_age_days.saturating_mul(24 * 60 * 60)
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }
}
