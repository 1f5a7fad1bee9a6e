//! The atomic unit of authorization state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use classdesk_core::UserId;

use crate::{PermissionKind, Scope};

/// Identity of a grant: at most one record per key can exist in a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    pub user_id: UserId,
    pub permission: PermissionKind,
    pub scope: Scope,
}

impl GrantKey {
    pub fn new(user_id: UserId, permission: PermissionKind, scope: Scope) -> Self {
        Self {
            user_id,
            permission,
            scope,
        }
    }
}

/// One issued permission fact tying a user, a permission kind and a scope.
///
/// # Invariants
/// - The scope is fixed at creation; retargeting means revoke-then-grant.
/// - `grant_id`, `granted_by` and `granted_at` are audit data and never take
///   part in identity or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub grant_id: Uuid,
    pub user_id: UserId,
    pub permission: PermissionKind,
    pub scope: Scope,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl GrantRecord {
    pub fn new(
        user_id: UserId,
        permission: PermissionKind,
        scope: Scope,
        granted_by: UserId,
        granted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            grant_id: Uuid::now_v7(),
            user_id,
            permission,
            scope,
            granted_by,
            granted_at,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn key(&self) -> GrantKey {
        GrantKey::new(self.user_id.clone(), self.permission, self.scope)
    }

    /// True iff an expiry is set and has been reached.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use classdesk_core::CustomerId;

    fn record() -> GrantRecord {
        GrantRecord::new(
            UserId::new("bob"),
            PermissionKind::EditCustomer,
            Scope::Customer(CustomerId::new(42)),
            UserId::new("admin"),
            Utc::now(),
        )
    }

    #[test]
    fn key_ignores_audit_fields() {
        let a = record();
        let b = record();
        assert_ne!(a.grant_id, b.grant_id);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let r = record().with_expiry(now);
        assert!(r.is_expired_at(now));
        assert!(!r.is_expired_at(now - Duration::seconds(1)));
        assert!(!record().is_expired_at(now + Duration::days(365)));
    }

    #[test]
    fn missing_expiry_is_omitted_from_json() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("expires_at").is_none());
        assert_eq!(json["permission"], "customer.edit");
        assert_eq!(json["scope"], serde_json::json!({ "kind": "customer", "id": 42 }));
    }
}
