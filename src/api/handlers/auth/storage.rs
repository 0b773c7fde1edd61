//! Postgres-backed [`CredentialStore`].
//!
//! Every call is bounded by the configured store timeout. Rotation runs in one transaction so a
//! refresh record can be consumed at most once.

use super::principal::{NewPrincipal, Principal, PrincipalKind};
use super::store::{CredentialStore, RefreshTokenRecord, StoreError, REFRESH_RECORD_TTL_SECONDS};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use std::{future::Future, time::Duration};
use tracing::{info_span, Instrument, Span};

// `password_hash` is selected only by the email lookup used for login.
const PRINCIPAL_COLUMNS: &str = "id, email, role, name, phone_number, address, avatar_url";
// Expiry comes back as unix seconds so callers never handle timestamptz.
const RECORD_COLUMNS: &str =
    "id, principal_id, EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix";

/// One table pair per [`PrincipalKind`]: the principals and their refresh records.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    /// Upper bound for a whole store call, pool acquisition included.
    timeout: Duration,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `operation` under the store timeout; an elapsed timer becomes [`StoreError::Timeout`].
    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

/// Span wrapping one statement, with OpenTelemetry database attributes.
fn query_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// `with_hash` must match whether the query selected `password_hash`.
fn principal_from_row(row: &PgRow, with_hash: bool) -> Principal {
    Principal {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: if with_hash {
            row.get("password_hash")
        } else {
            None
        },
        role: row.get("role"),
        name: row.get("name"),
        phone_number: row.get("phone_number"),
        address: row.get("address"),
        avatar_url: row.get("avatar_url"),
    }
}

/// Expects the [`RECORD_COLUMNS`] projection.
fn record_from_row(row: &PgRow) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: row.get("id"),
        principal_id: row.get("principal_id"),
        expires_at_unix: row.get("expires_at_unix"),
    }
}

/// SQLSTATE 23505, raised here by the unique email constraint on each principal table.
pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_principal_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let query = format!(
            "SELECT {PRINCIPAL_COLUMNS}, password_hash FROM {} WHERE email = $1",
            kind.principal_table()
        );
        self.bounded(async {
            let row = sqlx::query(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", &query))
                .await?;
            Ok(row.map(|row| principal_from_row(&row, true)))
        })
        .await
    }

    async fn find_principal_by_id(
        &self,
        kind: PrincipalKind,
        id: i64,
    ) -> Result<Option<Principal>, StoreError> {
        let query = format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM {} WHERE id = $1",
            kind.principal_table()
        );
        self.bounded(async {
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", &query))
                .await?;
            Ok(row.map(|row| principal_from_row(&row, false)))
        })
        .await
    }

    async fn insert_principal(
        &self,
        kind: PrincipalKind,
        principal: &NewPrincipal,
    ) -> Result<Principal, StoreError> {
        let query = format!(
            "INSERT INTO {} (email, password_hash, role, name, phone_number, address, avatar_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRINCIPAL_COLUMNS}",
            kind.principal_table()
        );
        self.bounded(async {
            let result = sqlx::query(&query)
                .bind(&principal.email)
                .bind(&principal.password_hash)
                .bind(&principal.role)
                .bind(&principal.name)
                .bind(&principal.phone_number)
                .bind(&principal.address)
                .bind(&principal.avatar_url)
                .fetch_one(&self.pool)
                .instrument(query_span("INSERT", &query))
                .await;
            match result {
                Ok(row) => Ok(principal_from_row(&row, false)),
                Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn persist_refresh_token(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let query = format!(
            "INSERT INTO {} (principal_id, expires_at) \
             VALUES ($1, NOW() + ($2 * INTERVAL '1 second')) RETURNING {RECORD_COLUMNS}",
            kind.refresh_table()
        );
        self.bounded(async {
            let row = sqlx::query(&query)
                .bind(principal_id)
                .bind(REFRESH_RECORD_TTL_SECONDS)
                .fetch_one(&self.pool)
                .instrument(query_span("INSERT", &query))
                .await?;
            Ok(record_from_row(&row))
        })
        .await
    }

    async fn delete_refresh_token(&self, kind: PrincipalKind, id: i64) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {} WHERE id = $1", kind.refresh_table());
        self.bounded(async {
            sqlx::query(&query)
                .bind(id)
                .execute(&self.pool)
                .instrument(query_span("DELETE", &query))
                .await?;
            Ok(())
        })
        .await
    }

    async fn find_refresh_token(
        &self,
        kind: PrincipalKind,
        id: i64,
        principal_id: i64,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE id = $1 AND principal_id = $2",
            kind.refresh_table()
        );
        self.bounded(async {
            let row = sqlx::query(&query)
                .bind(id)
                .bind(principal_id)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", &query))
                .await?;
            Ok(row.as_ref().map(record_from_row))
        })
        .await
    }

    async fn rotate_refresh_token(
        &self,
        kind: PrincipalKind,
        old_id: i64,
        principal_id: i64,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let consume = format!(
            "DELETE FROM {} WHERE id = $1 AND principal_id = $2 RETURNING id",
            kind.refresh_table()
        );
        let replace = format!(
            "INSERT INTO {} (principal_id, expires_at) \
             VALUES ($1, NOW() + ($2 * INTERVAL '1 second')) RETURNING {RECORD_COLUMNS}",
            kind.refresh_table()
        );
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            // The row lock taken here makes a concurrent rotate of the same id see zero rows.
            let consumed = sqlx::query(&consume)
                .bind(old_id)
                .bind(principal_id)
                .fetch_optional(&mut *tx)
                .instrument(query_span("DELETE", &consume))
                .await?;
            if consumed.is_none() {
                tx.rollback().await?;
                return Ok(None);
            }

            let row = sqlx::query(&replace)
                .bind(principal_id)
                .bind(REFRESH_RECORD_TTL_SECONDS)
                .fetch_one(&mut *tx)
                .instrument(query_span("INSERT", &replace))
                .await?;
            tx.commit().await?;
            Ok(Some(record_from_row(&row)))
        })
        .await
    }

    async fn purge_expired_refresh_tokens(&self, kind: PrincipalKind) -> Result<u64, StoreError> {
        let query = format!(
            "DELETE FROM {} WHERE expires_at <= NOW()",
            kind.refresh_table()
        );
        self.bounded(async {
            let result = sqlx::query(&query)
                .execute(&self.pool)
                .instrument(query_span("DELETE", &query))
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self
                .pool
                .acquire()
                .instrument(info_span!(
                    "db.acquire",
                    db.system = "postgresql",
                    db.operation = "ACQUIRE"
                ))
                .await?;
            conn.ping()
                .instrument(info_span!(
                    "db.ping",
                    db.system = "postgresql",
                    db.operation = "PING"
                ))
                .await?;
            Ok(())
        })
        .await
    }
}
