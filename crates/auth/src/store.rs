//! Grant storage.
//!
//! The store is the sole source of truth for authorization state. It is an
//! set of [`GrantRecord`]s keyed by [`GrantKey`]; a record is only ever
//! added, removed, or replaced whole by a fresh grant.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use classdesk_core::UserId;

use crate::{GrantKey, GrantRecord, PermissionKind, Scope};

/// Grant store abstraction.
pub trait GrantStore: Send + Sync {
    /// Add a record unless one with the same key exists.
    ///
    /// Returns `true` if the record was added. Duplicates are not an error.
    fn insert(&self, record: GrantRecord) -> Result<bool, GrantStoreError>;

    /// Insert each record independently; existing keys do not block the rest.
    ///
    /// Returns the number of records added.
    fn insert_batch(&self, records: Vec<GrantRecord>) -> Result<usize, GrantStoreError> {
        let mut added = 0;
        for record in records {
            if self.insert(record)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Add a record, or replace the one under its key if that record has
    /// expired at `now` or carries a different expiry.
    ///
    /// Returns `true` if the store changed. A live record with the same
    /// expiry is left untouched.
    fn insert_or_refresh(
        &self,
        record: GrantRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, GrantStoreError> {
        let key = record.key();
        if let Some(existing) = self.get(&key)? {
            if !needs_refresh(&existing, &record, now) {
                return Ok(false);
            }
            self.remove(&key)?;
        }
        self.insert(record)
    }

    /// Delete the record with this key, if any.
    ///
    /// Returns `true` if a record was removed. Absent keys are a no-op.
    fn remove(&self, key: &GrantKey) -> Result<bool, GrantStoreError>;

    /// Exact lookup by key.
    fn get(&self, key: &GrantKey) -> Result<Option<GrantRecord>, GrantStoreError>;

    /// Every record held by a user (no guaranteed order).
    fn query_by_user(&self, user_id: &UserId) -> Result<Vec<GrantRecord>, GrantStoreError>;

    /// Distinct users holding `permission` at a scope that satisfies a lookup
    /// for `scope`.
    ///
    /// Global holders always qualify; a resource scope additionally admits
    /// holders of that exact resource. Sorted ascending.
    fn query_by_subject(
        &self,
        permission: PermissionKind,
        scope: Option<&Scope>,
    ) -> Result<Vec<UserId>, GrantStoreError>;

    /// Every record, sorted by key.
    fn all(&self) -> Result<Vec<GrantRecord>, GrantStoreError>;

    fn len(&self) -> Result<usize, GrantStoreError>;

    fn is_empty(&self) -> Result<bool, GrantStoreError> {
        Ok(self.len()? == 0)
    }

    /// Remove every record whose expiry is at or before `now`.
    ///
    /// Explicit administrative sweep; nothing calls this automatically.
    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, GrantStoreError>;

    /// Clear the store entirely.
    fn reset(&self) -> Result<(), GrantStoreError>;
}

impl<S> GrantStore for Arc<S>
where
    S: GrantStore + ?Sized,
{
    fn insert(&self, record: GrantRecord) -> Result<bool, GrantStoreError> {
        (**self).insert(record)
    }

    fn insert_batch(&self, records: Vec<GrantRecord>) -> Result<usize, GrantStoreError> {
        (**self).insert_batch(records)
    }

    fn insert_or_refresh(
        &self,
        record: GrantRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, GrantStoreError> {
        (**self).insert_or_refresh(record, now)
    }

    fn remove(&self, key: &GrantKey) -> Result<bool, GrantStoreError> {
        (**self).remove(key)
    }

    fn get(&self, key: &GrantKey) -> Result<Option<GrantRecord>, GrantStoreError> {
        (**self).get(key)
    }

    fn query_by_user(&self, user_id: &UserId) -> Result<Vec<GrantRecord>, GrantStoreError> {
        (**self).query_by_user(user_id)
    }

    fn query_by_subject(
        &self,
        permission: PermissionKind,
        scope: Option<&Scope>,
    ) -> Result<Vec<UserId>, GrantStoreError> {
        (**self).query_by_subject(permission, scope)
    }

    fn all(&self) -> Result<Vec<GrantRecord>, GrantStoreError> {
        (**self).all()
    }

    fn len(&self) -> Result<usize, GrantStoreError> {
        (**self).len()
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, GrantStoreError> {
        (**self).prune_expired(now)
    }

    fn reset(&self) -> Result<(), GrantStoreError> {
        (**self).reset()
    }
}

fn needs_refresh(existing: &GrantRecord, incoming: &GrantRecord, now: DateTime<Utc>) -> bool {
    existing.is_expired_at(now) || existing.expires_at != incoming.expires_at
}

/// Grant store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantStoreError {
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Default)]
struct Indexed {
    grants: HashMap<GrantKey, GrantRecord>,
    by_user: HashMap<UserId, HashSet<GrantKey>>,
    by_subject: HashMap<(PermissionKind, Scope), BTreeSet<UserId>>,
}

impl Indexed {
    fn insert(&mut self, record: GrantRecord) -> bool {
        let key = record.key();
        if self.grants.contains_key(&key) {
            return false;
        }

        self.by_user
            .entry(key.user_id.clone())
            .or_default()
            .insert(key.clone());
        self.by_subject
            .entry((key.permission, key.scope))
            .or_default()
            .insert(key.user_id.clone());
        self.grants.insert(key, record);
        true
    }

    fn insert_or_refresh(&mut self, record: GrantRecord, now: DateTime<Utc>) -> bool {
        if let Some(existing) = self.grants.get_mut(&record.key()) {
            if !needs_refresh(existing, &record, now) {
                return false;
            }
            // Same key, so both secondary indexes already point here.
            *existing = record;
            return true;
        }
        self.insert(record)
    }

    fn remove(&mut self, key: &GrantKey) -> bool {
        if self.grants.remove(key).is_none() {
            return false;
        }

        if let Some(keys) = self.by_user.get_mut(&key.user_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_user.remove(&key.user_id);
            }
        }

        let subject = (key.permission, key.scope);
        if let Some(users) = self.by_subject.get_mut(&subject) {
            users.remove(&key.user_id);
            if users.is_empty() {
                self.by_subject.remove(&subject);
            }
        }
        true
    }
}

/// In-memory grant store.
///
/// A single `RwLock` guards the primary map and its two secondary indexes
/// (by user, and by `(permission, scope)`), so a resolution check costs a
/// constant number of hash lookups. Checks share the read lock; grants and
/// revokes take the write lock.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    inner: RwLock<Indexed>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Indexed>, GrantStoreError> {
        self.inner
            .read()
            .map_err(|e| GrantStoreError::Storage(format!("grant store lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Indexed>, GrantStoreError> {
        self.inner
            .write()
            .map_err(|e| GrantStoreError::Storage(format!("grant store lock poisoned: {e}")))
    }
}

impl GrantStore for InMemoryGrantStore {
    fn insert(&self, record: GrantRecord) -> Result<bool, GrantStoreError> {
        Ok(self.write()?.insert(record))
    }

    fn insert_batch(&self, records: Vec<GrantRecord>) -> Result<usize, GrantStoreError> {
        let mut inner = self.write()?;
        Ok(records
            .into_iter()
            .map(|record| inner.insert(record))
            .filter(|added| *added)
            .count())
    }

    fn insert_or_refresh(
        &self,
        record: GrantRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, GrantStoreError> {
        Ok(self.write()?.insert_or_refresh(record, now))
    }

    fn remove(&self, key: &GrantKey) -> Result<bool, GrantStoreError> {
        Ok(self.write()?.remove(key))
    }

    fn get(&self, key: &GrantKey) -> Result<Option<GrantRecord>, GrantStoreError> {
        Ok(self.read()?.grants.get(key).cloned())
    }

    fn query_by_user(&self, user_id: &UserId) -> Result<Vec<GrantRecord>, GrantStoreError> {
        let inner = self.read()?;
        let Some(keys) = inner.by_user.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| inner.grants.get(key).cloned())
            .collect())
    }

    fn query_by_subject(
        &self,
        permission: PermissionKind,
        scope: Option<&Scope>,
    ) -> Result<Vec<UserId>, GrantStoreError> {
        let inner = self.read()?;
        let mut holders: BTreeSet<UserId> = BTreeSet::new();

        if let Some(users) = inner.by_subject.get(&(permission, Scope::Global)) {
            holders.extend(users.iter().cloned());
        }

        if let Some(scope) = scope.filter(|s| !s.is_global()) {
            if let Some(users) = inner.by_subject.get(&(permission, *scope)) {
                holders.extend(users.iter().cloned());
            }
        }

        Ok(holders.into_iter().collect())
    }

    fn all(&self) -> Result<Vec<GrantRecord>, GrantStoreError> {
        let inner = self.read()?;
        let mut records: Vec<GrantRecord> = inner.grants.values().cloned().collect();
        records.sort_by_key(GrantRecord::key);
        Ok(records)
    }

    fn len(&self) -> Result<usize, GrantStoreError> {
        Ok(self.read()?.grants.len())
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, GrantStoreError> {
        let mut inner = self.write()?;
        let expired: Vec<GrantKey> = inner
            .grants
            .iter()
            .filter(|(_, record)| record.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        Ok(expired.len())
    }

    fn reset(&self) -> Result<(), GrantStoreError> {
        *self.write()? = Indexed::default();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
