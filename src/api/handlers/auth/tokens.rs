//! Access and refresh token issuance.
//!
//! Access tokens are RS256 and stateless. Refresh tokens are HS256 and carry the id of their
//! backing record in `jti`. Both families name their principal kind in `aud`, so a token
//! minted for one kind is never accepted on another kind's routes.

use super::{keys::SigningKeyMaterial, principal::PrincipalKind, utils::now_unix_seconds};
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const SECONDS_PER_HOUR: i64 = 60 * 60;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("token claim `{0}` is not a valid identifier")]
    Claim(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub role: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    /// # Errors
    /// Returns an error if `sub` is not a principal id.
    pub fn subject(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Claim("sub"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub role: String,
    pub jti: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    /// # Errors
    /// Returns an error if `sub` is not a principal id.
    pub fn subject(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Claim("sub"))
    }

    /// # Errors
    /// Returns an error if `jti` is not a refresh-record id.
    pub fn record_id(&self) -> Result<i64, TokenError> {
        self.jti.parse().map_err(|_| TokenError::Claim("jti"))
    }
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<SigningKeyMaterial>,
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(
        keys: Arc<SigningKeyMaterial>,
        issuer: impl Into<String>,
        access_ttl_hours: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            access_ttl_seconds: access_ttl_hours.saturating_mul(SECONDS_PER_HOUR),
            refresh_ttl_seconds: refresh_ttl_days.saturating_mul(SECONDS_PER_DAY),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn keys(&self) -> &SigningKeyMaterial {
        &self.keys
    }

    /// Sign an RS256 access token for `subject`, audience-bound to `kind`.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_access_token(
        &self,
        kind: PrincipalKind,
        subject: i64,
        role: &str,
    ) -> Result<String, TokenError> {
        let now = now_unix_seconds();
        let claims = AccessClaims {
            sub: subject.to_string(),
            role: role.to_string(),
            aud: kind.audience().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.access_ttl_seconds),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.keys.key_id().map(str::to_string);
        jsonwebtoken::encode(&header, &claims, self.keys.access_signing_key())
            .map_err(TokenError::Sign)
    }

    /// Sign an HS256 refresh token backed by the record `record_id`.
    ///
    /// The record must already be persisted; its id becomes `jti`.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_refresh_token(
        &self,
        kind: PrincipalKind,
        subject: i64,
        role: &str,
        record_id: i64,
    ) -> Result<String, TokenError> {
        let now = now_unix_seconds();
        let claims = RefreshClaims {
            sub: subject.to_string(),
            role: role.to_string(),
            jti: record_id.to_string(),
            aud: kind.audience().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.refresh_ttl_seconds),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            self.keys.refresh_signing_key(),
        )
        .map_err(TokenError::Sign)
    }

    /// Verify a refresh token's signature, issuer, audience and expiry.
    ///
    /// # Errors
    /// Returns an error if any check fails.
    pub fn verify_refresh_token(
        &self,
        kind: PrincipalKind,
        token: &str,
    ) -> Result<RefreshClaims, TokenError> {
        self.decode_refresh(kind, token, true)
    }

    /// Like [`Self::verify_refresh_token`] but an elapsed `exp` is accepted.
    ///
    /// Logout uses this to find the record behind a token that has already expired.
    ///
    /// # Errors
    /// Returns an error if the signature, issuer or audience check fails.
    pub fn parse_refresh_token(
        &self,
        kind: PrincipalKind,
        token: &str,
    ) -> Result<RefreshClaims, TokenError> {
        self.decode_refresh(kind, token, false)
    }

    fn decode_refresh(
        &self,
        kind: PrincipalKind,
        token: &str,
        validate_exp: bool,
    ) -> Result<RefreshClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[kind.audience()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = validate_exp;
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<RefreshClaims>(
            token,
            self.keys.refresh_verification_key(),
            &validation,
        )
        .map_err(TokenError::Invalid)?;
        Ok(data.claims)
    }
}

/// Verify an RS256 access token against `key` for the routes of `kind`.
///
/// # Errors
/// Returns an error if the signature, algorithm, issuer, audience or expiry check fails.
pub fn verify_access_token(
    token: &str,
    key: &DecodingKey,
    issuer: &str,
    kind: PrincipalKind,
) -> Result<AccessClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[kind.audience()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.leeway = 0;
    let data =
        jsonwebtoken::decode::<AccessClaims>(token, key, &validation).map_err(TokenError::Invalid)?;
    Ok(data.claims)
}

/// `kid` from an unverified header, used only to pick a verification key.
///
/// # Errors
/// Returns an error if the header cannot be decoded.
pub fn access_token_kid(token: &str) -> Result<Option<String>, TokenError> {
    jsonwebtoken::decode_header(token)
        .map(|header| header.kid)
        .map_err(TokenError::Invalid)
}
