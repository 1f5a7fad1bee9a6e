//! Snapshot file handling for the admin tool.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use classdesk_auth::{GrantSnapshot, GrantStore};

/// Load a snapshot file into `store`, replacing its contents.
///
/// A missing file is treated as an empty grant set.
pub fn load_into<S>(path: &Path, store: &S) -> Result<usize>
where
    S: GrantStore + ?Sized,
{
    if !path.exists() {
        tracing::info!(path = %path.display(), "no grant snapshot yet; starting empty");
        store.reset()?;
        return Ok(0);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read grant snapshot {}", path.display()))?;
    let snapshot = GrantSnapshot::from_json(&raw)
        .with_context(|| format!("failed to parse grant snapshot {}", path.display()))?;
    let loaded = snapshot.restore_into(store)?;

    tracing::debug!(path = %path.display(), loaded, "grant snapshot loaded");
    Ok(loaded)
}

/// Write the store to `path`, replacing the previous file atomically.
pub fn save<S>(path: &Path, store: &S) -> Result<()>
where
    S: GrantStore + ?Sized,
{
    let json = GrantSnapshot::capture(store, Utc::now())?.to_json_pretty()?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;

    tracing::debug!(path = %path.display(), "grant snapshot saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use classdesk_auth::{GrantRecord, InMemoryGrantStore, PermissionKind, Scope};
    use classdesk_core::UserId;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("classdesk-admin-{}", uuid::Uuid::now_v7()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = scratch_dir();
        let store = InMemoryGrantStore::new();
        assert_eq!(load_into(&dir.join("absent.json"), &store).unwrap(), 0);
        assert!(store.is_empty().unwrap());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = scratch_dir();
        let path = dir.join("nested").join("grants.json");

        let store = InMemoryGrantStore::new();
        store
            .insert(GrantRecord::new(
                UserId::new("alice"),
                PermissionKind::ViewCustomerPhone,
                Scope::Global,
                UserId::new("admin"),
                Utc::now(),
            ))
            .unwrap();
        save(&path, &store).unwrap();
        assert!(!temp_path(&path).exists());

        let reloaded = InMemoryGrantStore::new();
        assert_eq!(load_into(&path, &reloaded).unwrap(), 1);
        assert_eq!(reloaded.all().unwrap(), store.all().unwrap());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn corrupt_file_reports_its_path() {
        let dir = scratch_dir();
        let path = dir.join("grants.json");
        fs::write(&path, "not json").unwrap();

        let err = load_into(&path, &InMemoryGrantStore::new()).unwrap_err();
        assert!(err.to_string().contains("grants.json"));
        fs::remove_dir_all(dir).unwrap();
    }
}
