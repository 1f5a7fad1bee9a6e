//! Read-side resolution: does user U hold permission P for optional resource R?
//!
//! - No IO beyond the store handle
//! - No panics
//! - Never errors: store failures are logged and resolve to "deny"

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classdesk_core::{ClassId, CustomerId, UserId};

use crate::clock::{Clock, SystemClock};
use crate::{GrantKey, GrantStore, PermissionKind, Scope};

/// Knobs for resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Treat grants whose `expires_at` has been reached as absent.
    ///
    /// Disabling this makes `expires_at` purely informational.
    pub enforce_expiry: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            enforce_expiry: true,
        }
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    GlobalGrant,
    CustomerGrant,
    ClassGrant,
    /// No resource id was supplied and the user has no global grant.
    NoResourceSupplied,
    /// A matching grant exists but has expired.
    Expired,
    NoMatchingGrant,
    /// The store could not be read; access is denied.
    StoreUnavailable,
}

/// Auditable outcome of a single resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub user_id: UserId,
    pub permission: PermissionKind,
    pub customer_id: Option<CustomerId>,
    pub class_id: Option<ClassId>,
    pub granted: bool,
    /// Scope of the grant that satisfied the check.
    pub matched: Option<Scope>,
    pub reason: DecisionReason,
    pub evaluated_at: DateTime<Utc>,
}

/// Resolution engine over a grant store.
///
/// Precedence, evaluated in order and short-circuiting on the first live match:
/// 1. a global grant (resource arguments are ignored),
/// 2. a grant for the supplied customer,
/// 3. a grant for the supplied class.
///
/// Scopes are independent: a customer grant never satisfies a class check and
/// vice versa.
pub struct PermissionResolver<S> {
    store: S,
    policy: ResolutionPolicy,
    clock: Arc<dyn Clock>,
}

impl<S> PermissionResolver<S>
where
    S: GrantStore,
{
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ResolutionPolicy::default())
    }

    pub fn with_policy(store: S, policy: ResolutionPolicy) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Safe to call on every rendered row: boolean, never panics.
    pub fn has_permission(
        &self,
        user_id: &UserId,
        permission: PermissionKind,
        customer_id: Option<CustomerId>,
        class_id: Option<ClassId>,
    ) -> bool {
        self.has_permission_at(self.clock.now(), user_id, permission, customer_id, class_id)
    }

    pub fn has_permission_at(
        &self,
        now: DateTime<Utc>,
        user_id: &UserId,
        permission: PermissionKind,
        customer_id: Option<CustomerId>,
        class_id: Option<ClassId>,
    ) -> bool {
        self.explain_at(now, user_id, permission, customer_id, class_id)
            .granted
    }

    pub fn has_global(&self, user_id: &UserId, permission: PermissionKind) -> bool {
        self.has_permission(user_id, permission, None, None)
    }

    pub fn has_for_customer(
        &self,
        user_id: &UserId,
        permission: PermissionKind,
        customer_id: CustomerId,
    ) -> bool {
        self.has_permission(user_id, permission, Some(customer_id), None)
    }

    pub fn has_for_class(&self, user_id: &UserId, permission: PermissionKind, class_id: ClassId) -> bool {
        self.has_permission(user_id, permission, None, Some(class_id))
    }

    /// Resolve and report which grant (if any) decided the outcome.
    pub fn explain(
        &self,
        user_id: &UserId,
        permission: PermissionKind,
        customer_id: Option<CustomerId>,
        class_id: Option<ClassId>,
    ) -> Decision {
        self.explain_at(self.clock.now(), user_id, permission, customer_id, class_id)
    }

    pub fn explain_at(
        &self,
        now: DateTime<Utc>,
        user_id: &UserId,
        permission: PermissionKind,
        customer_id: Option<CustomerId>,
        class_id: Option<ClassId>,
    ) -> Decision {
        let decide = |granted: bool, matched: Option<Scope>, reason: DecisionReason| Decision {
            user_id: user_id.clone(),
            permission,
            customer_id,
            class_id,
            granted,
            matched,
            reason,
            evaluated_at: now,
        };

        let candidates = [
            Some(Scope::Global),
            customer_id.map(Scope::Customer),
            class_id.map(Scope::Class),
        ];

        let mut saw_expired = false;
        for scope in candidates.into_iter().flatten() {
            let key = GrantKey::new(user_id.clone(), permission, scope);
            let record = match self.store.get(&key) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(
                        user = %user_id,
                        permission = %permission,
                        error = %e,
                        "grant lookup failed; denying"
                    );
                    return decide(false, None, DecisionReason::StoreUnavailable);
                }
            };

            let Some(record) = record else {
                continue;
            };

            if self.policy.enforce_expiry && record.is_expired_at(now) {
                saw_expired = true;
                continue;
            }

            let reason = match scope {
                Scope::Global => DecisionReason::GlobalGrant,
                Scope::Customer(_) => DecisionReason::CustomerGrant,
                Scope::Class(_) => DecisionReason::ClassGrant,
            };
            tracing::trace!(user = %user_id, permission = %permission, scope = %scope, "permission granted");
            return decide(true, Some(scope), reason);
        }

        let reason = if saw_expired {
            DecisionReason::Expired
        } else if customer_id.is_none() && class_id.is_none() {
            DecisionReason::NoResourceSupplied
        } else {
            DecisionReason::NoMatchingGrant
        };
        tracing::trace!(user = %user_id, permission = %permission, reason = ?reason, "permission denied");
        decide(false, None, reason)
    }

    /// Users who would pass a check for `permission` at `scope` right now.
    pub fn holders(&self, permission: PermissionKind, scope: Option<Scope>) -> Vec<UserId> {
        self.holders_at(self.clock.now(), permission, scope)
    }

    pub fn holders_at(
        &self,
        now: DateTime<Utc>,
        permission: PermissionKind,
        scope: Option<Scope>,
    ) -> Vec<UserId> {
        let candidates = match self.store.query_by_subject(permission, scope.as_ref()) {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(permission = %permission, error = %e, "holder lookup failed");
                return Vec::new();
            }
        };

        if !self.policy.enforce_expiry {
            return candidates;
        }

        let (customer_id, class_id) = match scope {
            Some(Scope::Customer(id)) => (Some(id), None),
            Some(Scope::Class(id)) => (None, Some(id)),
            Some(Scope::Global) | None => (None, None),
        };

        candidates
            .into_iter()
            .filter(|user| self.has_permission_at(now, user, permission, customer_id, class_id))
            .collect()
    }
}
