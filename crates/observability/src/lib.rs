//! Tracing/logging setup shared by ClassDesk binaries.

/// Initialize process-wide tracing with the format chosen by the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
