//! Write-side surface: the only legitimate way to mutate a grant store.
//!
//! Callers are expected to have authorized the acting administrator already;
//! this layer performs no self-authorization. Every call is idempotent per
//! permission kind: re-granting a held permission or revoking an absent one
//! changes nothing and is not an error.
//!
//! A re-grant does replace the held record when that record has expired, or
//! when the request asks for a different expiry. This is how an expiry is
//! extended, shortened, or dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use classdesk_core::{ClassId, CustomerId, UserId};

use crate::clock::{Clock, SystemClock};
use crate::{GrantKey, GrantRecord, GrantStore, GrantStoreError, PermissionKind, Scope, ScopeKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("user id must not be blank")]
    BlankUserId,

    #[error("permission list must not be empty")]
    EmptyPermissionList,

    #[error("permission '{permission}' cannot be used at {scope} scope")]
    ScopeNotAllowed {
        permission: PermissionKind,
        scope: ScopeKind,
    },

    #[error("expiry {expires_at} is not after issue time {issued_at}")]
    ExpiryNotInFuture {
        expires_at: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Store(#[from] GrantStoreError),
}

/// Issue one or more permission kinds to a user at one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    pub user_id: UserId,
    pub scope: Scope,
    pub permissions: Vec<PermissionKind>,
    pub granted_by: UserId,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Withdraw one or more permission kinds from a user at one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeRequest {
    pub user_id: UserId,
    pub scope: Scope,
    pub permissions: Vec<PermissionKind>,
    pub revoked_by: UserId,
}

/// Per-kind result of a lifecycle call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleOutcome {
    /// Kinds whose record was added (grant) or removed (revoke).
    pub changed: Vec<PermissionKind>,
    /// Kinds that were already in the requested state.
    pub unchanged: Vec<PermissionKind>,
}

impl LifecycleOutcome {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Grant lifecycle service over a store handle.
pub struct GrantLifecycle<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> GrantLifecycle<S>
where
    S: GrantStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn grant(&self, request: GrantRequest) -> Result<LifecycleOutcome, GrantError> {
        let permissions = validate(&request.user_id, request.scope, &request.permissions)?;
        let issued_at = self.clock.now();

        if let Some(expires_at) = request.expires_at {
            if expires_at <= issued_at {
                return Err(GrantError::ExpiryNotInFuture {
                    expires_at,
                    issued_at,
                });
            }
        }

        let mut outcome = LifecycleOutcome::default();
        for permission in permissions {
            let mut record = GrantRecord::new(
                request.user_id.clone(),
                permission,
                request.scope,
                request.granted_by.clone(),
                issued_at,
            );
            record.expires_at = request.expires_at;

            match self.store.insert_or_refresh(record, issued_at) {
                Ok(true) => outcome.changed.push(permission),
                Ok(false) => outcome.unchanged.push(permission),
                Err(e) => {
                    tracing::error!(
                        user = %request.user_id,
                        scope = %request.scope,
                        actor = %request.granted_by,
                        granted = ?outcome.changed,
                        already_held = ?outcome.unchanged,
                        failed = %permission,
                        error = %e,
                        "grant interrupted by store failure"
                    );
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            user = %request.user_id,
            scope = %request.scope,
            actor = %request.granted_by,
            granted = ?outcome.changed,
            already_held = ?outcome.unchanged,
            expires_at = ?request.expires_at,
            "permissions granted"
        );
        Ok(outcome)
    }

    pub fn revoke(&self, request: RevokeRequest) -> Result<LifecycleOutcome, GrantError> {
        let permissions = validate(&request.user_id, request.scope, &request.permissions)?;

        let mut outcome = LifecycleOutcome::default();
        for permission in permissions {
            let key = GrantKey::new(request.user_id.clone(), permission, request.scope);
            match self.store.remove(&key) {
                Ok(true) => outcome.changed.push(permission),
                Ok(false) => outcome.unchanged.push(permission),
                Err(e) => {
                    tracing::error!(
                        user = %request.user_id,
                        scope = %request.scope,
                        actor = %request.revoked_by,
                        revoked = ?outcome.changed,
                        not_held = ?outcome.unchanged,
                        failed = %permission,
                        error = %e,
                        "revoke interrupted by store failure"
                    );
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            user = %request.user_id,
            scope = %request.scope,
            actor = %request.revoked_by,
            revoked = ?outcome.changed,
            not_held = ?outcome.unchanged,
            "permissions revoked"
        );
        Ok(outcome)
    }

    pub fn grant_global(
        &self,
        user_id: UserId,
        permissions: &[PermissionKind],
        granted_by: UserId,
    ) -> Result<LifecycleOutcome, GrantError> {
        self.grant(GrantRequest {
            user_id,
            scope: Scope::Global,
            permissions: permissions.to_vec(),
            granted_by,
            expires_at: None,
        })
    }

    pub fn grant_for_customer(
        &self,
        user_id: UserId,
        customer_id: CustomerId,
        permissions: &[PermissionKind],
        granted_by: UserId,
    ) -> Result<LifecycleOutcome, GrantError> {
        self.grant(GrantRequest {
            user_id,
            scope: Scope::Customer(customer_id),
            permissions: permissions.to_vec(),
            granted_by,
            expires_at: None,
        })
    }

    pub fn grant_for_class(
        &self,
        user_id: UserId,
        class_id: ClassId,
        permissions: &[PermissionKind],
        granted_by: UserId,
    ) -> Result<LifecycleOutcome, GrantError> {
        self.grant(GrantRequest {
            user_id,
            scope: Scope::Class(class_id),
            permissions: permissions.to_vec(),
            granted_by,
            expires_at: None,
        })
    }

    pub fn revoke_global(
        &self,
        user_id: UserId,
        permissions: &[PermissionKind],
        revoked_by: UserId,
    ) -> Result<LifecycleOutcome, GrantError> {
        self.revoke(RevokeRequest {
            user_id,
            scope: Scope::Global,
            permissions: permissions.to_vec(),
            revoked_by,
        })
    }

    pub fn revoke_for_customer(
        &self,
        user_id: UserId,
        customer_id: CustomerId,
        permissions: &[PermissionKind],
        revoked_by: UserId,
    ) -> Result<LifecycleOutcome, GrantError> {
        self.revoke(RevokeRequest {
            user_id,
            scope: Scope::Customer(customer_id),
            permissions: permissions.to_vec(),
            revoked_by,
        })
    }

    pub fn revoke_for_class(
        &self,
        user_id: UserId,
        class_id: ClassId,
        permissions: &[PermissionKind],
        revoked_by: UserId,
    ) -> Result<LifecycleOutcome, GrantError> {
        self.revoke(RevokeRequest {
            user_id,
            scope: Scope::Class(class_id),
            permissions: permissions.to_vec(),
            revoked_by,
        })
    }

    /// Remove grants whose expiry has passed. Returns how many were removed.
    pub fn prune_expired(&self, actor: &UserId) -> Result<usize, GrantError> {
        let now = self.clock.now();
        let removed = self.store.prune_expired(now)?;
        tracing::info!(actor = %actor, removed, at = %now, "expired grants pruned");
        Ok(removed)
    }

    /// Clear every grant. Administrative only.
    pub fn reset(&self, actor: &UserId) -> Result<(), GrantError> {
        self.store.reset()?;
        tracing::warn!(actor = %actor, "grant store reset");
        Ok(())
    }
}

/// Check a whole permission list against a scope before touching the store.
///
/// Returns the list with duplicates collapsed, in first-seen order.
fn validate(
    user_id: &UserId,
    scope: Scope,
    permissions: &[PermissionKind],
) -> Result<Vec<PermissionKind>, GrantError> {
    if user_id.as_str().trim().is_empty() {
        return Err(GrantError::BlankUserId);
    }
    if permissions.is_empty() {
        return Err(GrantError::EmptyPermissionList);
    }

    let mut unique: Vec<PermissionKind> = Vec::with_capacity(permissions.len());
    for &permission in permissions {
        if !permission.allows_scope(scope.kind()) {
            return Err(GrantError::ScopeNotAllowed {
                permission,
                scope: scope.kind(),
            });
        }
        if !unique.contains(&permission) {
            unique.push(permission);
        }
    }
    Ok(unique)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
