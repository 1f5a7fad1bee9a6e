//! `classdesk-admin` — administrative tool over a persisted grant snapshot.

pub mod commands;
pub mod config;
pub mod storage;

pub use commands::{Command, Session};
pub use config::AdminConfig;
