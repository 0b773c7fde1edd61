//! In-process [`CredentialStore`] for handler and flow tests.

use super::principal::{NewPrincipal, Principal, PrincipalKind};
use super::store::{CredentialStore, RefreshTokenRecord, StoreError, REFRESH_RECORD_TTL_SECONDS};
use super::utils::now_unix_seconds;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

#[derive(Debug, Default)]
struct Tables {
    next_principal_id: HashMap<PrincipalKind, i64>,
    next_record_id: HashMap<PrincipalKind, i64>,
    principals: HashMap<(PrincipalKind, i64), Principal>,
    records: HashMap<(PrincipalKind, i64), RefreshTokenRecord>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    fail_lookups: AtomicBool,
    time_out_lookups: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make revocation lookups fail with a database error.
    pub(crate) fn fail_lookups(&self, enabled: bool) {
        self.fail_lookups.store(enabled, Ordering::SeqCst);
    }

    /// Make revocation lookups report a timeout.
    pub(crate) fn time_out_lookups(&self, enabled: bool) {
        self.time_out_lookups.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn record_count(&self, kind: PrincipalKind) -> usize {
        self.tables()
            .records
            .keys()
            .filter(|(record_kind, _)| *record_kind == kind)
            .count()
    }

    pub(crate) fn contains_record(&self, kind: PrincipalKind, id: i64) -> bool {
        self.tables().records.contains_key(&(kind, id))
    }

    /// Insert a record with an explicit id, bypassing the sequence.
    pub(crate) fn insert_record_with_id(&self, kind: PrincipalKind, id: i64, principal_id: i64) {
        let mut tables = self.tables();
        tables.records.insert(
            (kind, id),
            RefreshTokenRecord {
                id,
                principal_id,
                expires_at_unix: now_unix_seconds() + REFRESH_RECORD_TTL_SECONDS,
            },
        );
        let next = tables.next_record_id.entry(kind).or_insert(0);
        *next = (*next).max(id);
    }

    /// Change a principal's role out of band.
    pub(crate) fn set_role(&self, kind: PrincipalKind, id: i64, role: &str) {
        if let Some(principal) = self.tables().principals.get_mut(&(kind, id)) {
            principal.role = role.to_string();
        }
    }

    pub(crate) fn remove_principal(&self, kind: PrincipalKind, id: i64) {
        let mut tables = self.tables();
        tables.principals.remove(&(kind, id));
        tables
            .records
            .retain(|(record_kind, _), record| *record_kind != kind || record.principal_id != id);
    }

    pub(crate) fn expire_all_records(&self, kind: PrincipalKind) {
        for ((record_kind, _), record) in &mut self.tables().records {
            if *record_kind == kind {
                record.expires_at_unix = now_unix_seconds() - 1;
            }
        }
    }

    fn new_record(tables: &mut Tables, kind: PrincipalKind, principal_id: i64) -> RefreshTokenRecord {
        let next = tables.next_record_id.entry(kind).or_insert(0);
        *next += 1;
        let record = RefreshTokenRecord {
            id: *next,
            principal_id,
            expires_at_unix: now_unix_seconds() + REFRESH_RECORD_TTL_SECONDS,
        };
        tables.records.insert((kind, record.id), record.clone());
        record
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_principal_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .tables()
            .principals
            .iter()
            .find(|((principal_kind, _), principal)| {
                *principal_kind == kind && principal.email == email
            })
            .map(|(_, principal)| principal.clone()))
    }

    async fn find_principal_by_id(
        &self,
        kind: PrincipalKind,
        id: i64,
    ) -> Result<Option<Principal>, StoreError> {
        // Returns the hash on purpose: callers must strip it themselves.
        Ok(self.tables().principals.get(&(kind, id)).cloned())
    }

    async fn insert_principal(
        &self,
        kind: PrincipalKind,
        principal: &NewPrincipal,
    ) -> Result<Principal, StoreError> {
        let mut tables = self.tables();
        let taken = tables.principals.iter().any(|((principal_kind, _), existing)| {
            *principal_kind == kind && existing.email == principal.email
        });
        if taken {
            return Err(StoreError::Conflict);
        }
        let next = tables.next_principal_id.entry(kind).or_insert(0);
        *next += 1;
        let stored = Principal {
            id: *next,
            email: principal.email.clone(),
            password_hash: Some(principal.password_hash.clone()),
            role: principal.role.clone(),
            name: principal.name.clone(),
            phone_number: principal.phone_number.clone(),
            address: principal.address.clone(),
            avatar_url: principal.avatar_url.clone(),
        };
        tables.principals.insert((kind, stored.id), stored.clone());
        Ok(stored.without_secret())
    }

    async fn persist_refresh_token(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<RefreshTokenRecord, StoreError> {
        Ok(Self::new_record(&mut self.tables(), kind, principal_id))
    }

    async fn delete_refresh_token(&self, kind: PrincipalKind, id: i64) -> Result<(), StoreError> {
        self.tables().records.remove(&(kind, id));
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        kind: PrincipalKind,
        id: i64,
        principal_id: i64,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        if self.time_out_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self
            .tables()
            .records
            .get(&(kind, id))
            .filter(|record| record.principal_id == principal_id)
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        kind: PrincipalKind,
        old_id: i64,
        principal_id: i64,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let mut tables = self.tables();
        let owned = tables
            .records
            .get(&(kind, old_id))
            .is_some_and(|record| record.principal_id == principal_id);
        if !owned {
            return Ok(None);
        }
        tables.records.remove(&(kind, old_id));
        Ok(Some(Self::new_record(&mut tables, kind, principal_id)))
    }

    async fn purge_expired_refresh_tokens(&self, kind: PrincipalKind) -> Result<u64, StoreError> {
        let now = now_unix_seconds();
        let mut tables = self.tables();
        let before = tables.records.len();
        tables
            .records
            .retain(|(record_kind, _), record| *record_kind != kind || record.expires_at_unix > now);
        Ok(u64::try_from(before - tables.records.len()).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}
