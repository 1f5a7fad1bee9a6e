//! Admin tool configuration.
//!
//! Values come from the environment and can be overridden by command-line
//! flags. Missing values fall back to development defaults with a warning.

use std::path::PathBuf;

use classdesk_auth::ResolutionPolicy;
use classdesk_core::UserId;

pub const GRANTS_FILE_ENV: &str = "CLASSDESK_GRANTS_FILE";
pub const ENFORCE_EXPIRY_ENV: &str = "CLASSDESK_ENFORCE_EXPIRY";
pub const ACTOR_ENV: &str = "CLASSDESK_ACTOR";

const DEFAULT_GRANTS_FILE: &str = "grants.json";
const DEFAULT_ACTOR: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    /// Snapshot file the tool reads and writes.
    pub grants_file: PathBuf,
    /// Identity recorded as `granted_by` on mutations.
    pub actor: UserId,
    pub policy: ResolutionPolicy,
}

impl AdminConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let grants_file = lookup(GRANTS_FILE_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GRANTS_FILE));

        let actor = match lookup(ACTOR_ENV).map(|v| v.parse::<UserId>()) {
            Some(Ok(actor)) => actor,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "{ACTOR_ENV} is invalid; using '{DEFAULT_ACTOR}'");
                UserId::new(DEFAULT_ACTOR)
            }
            None => {
                tracing::warn!("{ACTOR_ENV} not set; using '{DEFAULT_ACTOR}'");
                UserId::new(DEFAULT_ACTOR)
            }
        };

        let enforce_expiry = match lookup(ENFORCE_EXPIRY_ENV) {
            None => true,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "{ENFORCE_EXPIRY_ENV} is not a boolean; enforcing expiry");
                true
            }),
        };

        Self {
            grants_file,
            actor,
            policy: ResolutionPolicy { enforce_expiry },
        }
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(mut self, grants_file: Option<PathBuf>, actor: Option<UserId>, no_expiry: bool) -> Self {
        if let Some(path) = grants_file {
            self.grants_file = path;
        }
        if let Some(actor) = actor {
            self.actor = actor;
        }
        if no_expiry {
            self.policy.enforce_expiry = false;
        }
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
