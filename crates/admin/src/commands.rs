//! Admin tool commands.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use classdesk_auth::{
    GrantLifecycle, GrantRecord, GrantRequest, GrantStore, InMemoryGrantStore, PermissionKind,
    PermissionResolver, ResolutionPolicy, RevokeRequest, Scope,
};
use classdesk_core::{ClassId, CustomerId, UserId};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Grant permission kinds to a user
    Grant {
        user: UserId,

        /// Comma-separated permission kinds (e.g. customer.view,customer.edit)
        #[arg(value_delimiter = ',', required = true)]
        permissions: Vec<PermissionKind>,

        #[command(flatten)]
        target: Target,

        /// Expiry timestamp (RFC 3339)
        #[arg(long)]
        expires: Option<DateTime<Utc>>,
    },

    /// Revoke permission kinds from a user
    Revoke {
        user: UserId,

        /// Comma-separated permission kinds
        #[arg(value_delimiter = ',', required = true)]
        permissions: Vec<PermissionKind>,

        #[command(flatten)]
        target: Target,
    },

    /// Print `allow` or `deny` for a single check
    Check {
        user: UserId,
        permission: PermissionKind,

        #[command(flatten)]
        resource: Resource,
    },

    /// Print the full decision for a check as JSON
    Explain {
        user: UserId,
        permission: PermissionKind,

        #[command(flatten)]
        resource: Resource,
    },

    /// List a user's grants as JSON
    List { user: UserId },

    /// List users who pass a check, one per line
    Who {
        permission: PermissionKind,

        #[command(flatten)]
        target: Target,
    },

    /// Remove grants whose expiry has passed
    Prune,

    /// Remove every grant
    Reset,
}

impl Command {
    /// Whether running this command can change the grant set.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Grant { .. } | Command::Revoke { .. } | Command::Prune | Command::Reset
        )
    }
}

/// Scope selector for grant/revoke/who. No flag means global.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct Target {
    /// Target a single customer
    #[arg(long, conflicts_with = "class")]
    pub customer: Option<CustomerId>,

    /// Target a single class
    #[arg(long)]
    pub class: Option<ClassId>,
}

impl Target {
    pub fn scope(&self) -> Scope {
        match (self.customer, self.class) {
            (Some(customer), _) => Scope::Customer(customer),
            (None, Some(class)) => Scope::Class(class),
            (None, None) => Scope::Global,
        }
    }
}

/// Optional resource ids for a check. Both may be supplied.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct Resource {
    #[arg(long)]
    pub customer: Option<CustomerId>,

    #[arg(long)]
    pub class: Option<ClassId>,
}

/// One invocation's view of the engine: a store plus both API surfaces.
pub struct Session {
    store: Arc<InMemoryGrantStore>,
    lifecycle: GrantLifecycle<Arc<InMemoryGrantStore>>,
    resolver: PermissionResolver<Arc<InMemoryGrantStore>>,
    actor: UserId,
}

impl Session {
    pub fn new(store: Arc<InMemoryGrantStore>, policy: ResolutionPolicy, actor: UserId) -> Self {
        Self {
            lifecycle: GrantLifecycle::new(Arc::clone(&store)),
            resolver: PermissionResolver::with_policy(Arc::clone(&store), policy),
            store,
            actor,
        }
    }

    pub fn store(&self) -> &Arc<InMemoryGrantStore> {
        &self.store
    }

    pub fn execute<W: Write>(&self, command: Command, out: &mut W) -> Result<()> {
        match command {
            Command::Grant {
                user,
                permissions,
                target,
                expires,
            } => {
                let outcome = self.lifecycle.grant(GrantRequest {
                    user_id: user,
                    scope: target.scope(),
                    permissions,
                    granted_by: self.actor.clone(),
                    expires_at: expires,
                })?;
                writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
            }
            Command::Revoke {
                user,
                permissions,
                target,
            } => {
                let outcome = self.lifecycle.revoke(RevokeRequest {
                    user_id: user,
                    scope: target.scope(),
                    permissions,
                    revoked_by: self.actor.clone(),
                })?;
                writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
            }
            Command::Check {
                user,
                permission,
                resource,
            } => {
                let allowed = self
                    .resolver
                    .has_permission(&user, permission, resource.customer, resource.class);
                writeln!(out, "{}", if allowed { "allow" } else { "deny" })?;
            }
            Command::Explain {
                user,
                permission,
                resource,
            } => {
                let decision = self
                    .resolver
                    .explain(&user, permission, resource.customer, resource.class);
                writeln!(out, "{}", serde_json::to_string_pretty(&decision)?)?;
            }
            Command::List { user } => {
                let mut grants = self.store.query_by_user(&user)?;
                grants.sort_by_key(GrantRecord::key);
                writeln!(out, "{}", serde_json::to_string_pretty(&grants)?)?;
            }
            Command::Who { permission, target } => {
                for user in self.resolver.holders(permission, Some(target.scope())) {
                    writeln!(out, "{user}")?;
                }
            }
            Command::Prune => {
                let removed = self.lifecycle.prune_expired(&self.actor)?;
                writeln!(out, "pruned {removed}")?;
            }
            Command::Reset => {
                self.lifecycle.reset(&self.actor)?;
                writeln!(out, "reset")?;
            }
        }
        Ok(())
    }
}
