//! `classdesk-auth` — scoped permission engine.
//!
//! Grants are global, customer-scoped or class-scoped facts about what a user
//! may see or do. This crate holds them, resolves checks against them and
//! exposes the lifecycle surface that issues and withdraws them.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod clock;
pub mod grant;
pub mod lifecycle;
pub mod permissions;
pub mod resolve;
pub mod scope;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use grant::{GrantKey, GrantRecord};
pub use lifecycle::{GrantError, GrantLifecycle, GrantRequest, LifecycleOutcome, RevokeRequest};
pub use permissions::PermissionKind;
pub use resolve::{Decision, DecisionReason, PermissionResolver, ResolutionPolicy};
pub use scope::{Scope, ScopeKind};
pub use snapshot::{GrantSnapshot, SnapshotError, SNAPSHOT_SCHEMA_VERSION};
pub use store::{GrantStore, GrantStoreError, InMemoryGrantStore};
