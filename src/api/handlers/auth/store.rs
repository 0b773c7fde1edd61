//! Persistence interface consumed by the auth flows.
//!
//! Every method is scoped to one [`PrincipalKind`]; implementations keep each kind's rows
//! apart so no lookup can cross kinds.

use super::principal::{NewPrincipal, Principal, PrincipalKind};
use async_trait::async_trait;
use thiserror::Error;

/// Lifetime of a refresh record, independent of the refresh token's own `exp`.
pub const REFRESH_RECORD_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row conflicts with an existing record")]
    Conflict,
    #[error("store operation timed out")]
    Timeout,
    #[error("store failure: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub principal_id: i64,
    pub expires_at_unix: i64,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credential lookup; the only read that returns `password_hash`.
    async fn find_principal_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<Principal>, StoreError>;

    async fn find_principal_by_id(
        &self,
        kind: PrincipalKind,
        id: i64,
    ) -> Result<Option<Principal>, StoreError>;

    /// Insert a principal. A duplicate email within the kind yields [`StoreError::Conflict`].
    async fn insert_principal(
        &self,
        kind: PrincipalKind,
        principal: &NewPrincipal,
    ) -> Result<Principal, StoreError>;

    async fn persist_refresh_token(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Idempotent: deleting an absent record succeeds.
    async fn delete_refresh_token(&self, kind: PrincipalKind, id: i64) -> Result<(), StoreError>;

    /// Revocation lookup, filtered by both record id and owning principal.
    async fn find_refresh_token(
        &self,
        kind: PrincipalKind,
        id: i64,
        principal_id: i64,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Atomically consume `old_id` and create its replacement.
    ///
    /// Returns `None` when `old_id` was already gone, including when a concurrent caller
    /// consumed it first. In that case nothing is created.
    async fn rotate_refresh_token(
        &self,
        kind: PrincipalKind,
        old_id: i64,
        principal_id: i64,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Delete records past `expires_at`; returns how many rows went away.
    async fn purge_expired_refresh_tokens(&self, kind: PrincipalKind) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
