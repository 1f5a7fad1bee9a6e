//! Drives the compiled `classdesk-admin` binary against a scratch snapshot.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;

fn scratch_file() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("classdesk-cli-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("grants.json")
}

fn admin(file: &Path, args: &[&str]) -> Output {
    admin_with_env(file, &[], args)
}

fn admin_with_env(file: &Path, envs: &[(&str, &str)], args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_classdesk-admin"))
        .arg("--file")
        .arg(file)
        .args(args)
        .env("CLASSDESK_ACTOR", "ops-lead")
        .env("RUST_LOG", "warn")
        .env_remove("CLASSDESK_ENFORCE_EXPIRY")
        .envs(envs.iter().copied())
        .output()
        .expect("failed to launch classdesk-admin")
}

/// Snapshot holding one global `customer.view` grant for erin that lapsed an hour ago.
fn write_lapsed_grant(file: &Path) {
    let an_hour_ago = Utc::now() - Duration::hours(1);
    let snapshot = json!({
        "schema_version": 1,
        "taken_at": an_hour_ago,
        "grants": [{
            "grant_id": uuid::Uuid::now_v7(),
            "user_id": "erin",
            "permission": "customer.view",
            "scope": { "kind": "global" },
            "granted_by": "ops-lead",
            "granted_at": an_hour_ago - Duration::days(1),
            "expires_at": an_hour_ago
        }]
    });
    std::fs::write(file, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();
}

fn check(file: &Path, args: &[&str]) -> String {
    stdout(&admin(file, args)).trim().to_string()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn grants_persist_between_invocations() {
    let file = scratch_file();

    stdout(&admin(&file, &["grant", "bob", "customer.edit,customer.view", "--customer", "42"]));
    assert!(file.exists());

    assert_eq!(stdout(&admin(&file, &["check", "bob", "customer.edit", "--customer", "42"])).trim(), "allow");
    assert_eq!(stdout(&admin(&file, &["check", "bob", "customer.edit", "--customer", "43"])).trim(), "deny");

    let listing: serde_json::Value = serde_json::from_str(&stdout(&admin(&file, &["list", "bob"]))).unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 2);
    assert_eq!(listing[0]["granted_by"], "ops-lead");

    stdout(&admin(&file, &["revoke", "bob", "customer.edit", "--customer", "42"]));
    assert_eq!(stdout(&admin(&file, &["check", "bob", "customer.edit", "--customer", "42"])).trim(), "deny");
    assert_eq!(stdout(&admin(&file, &["check", "bob", "customer.view", "--customer", "42"])).trim(), "allow");

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}

#[test]
fn scope_illegal_grant_fails_without_writing() {
    let file = scratch_file();

    let output = admin(&file, &["grant", "carol", "class.edit_student", "--customer", "1"]);
    assert!(!output.status.success());
    assert!(!file.exists());

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}

#[test]
fn customer_and_class_targets_conflict() {
    let file = scratch_file();

    let output = admin(&file, &["grant", "carol", "customer.view", "--customer", "1", "--class", "2"]);
    assert!(!output.status.success());

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}

#[test]
fn expiring_grant_is_honoured_until_it_lapses() {
    let file = scratch_file();
    let expires = (Utc::now() + Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true);

    stdout(&admin(&file, &["grant", "dana", "customer.view_phone", "--customer", "9", "--expires", &expires]));
    assert_eq!(check(&file, &["check", "dana", "customer.view_phone", "--customer", "9"]), "allow");

    let listing: serde_json::Value = serde_json::from_str(&stdout(&admin(&file, &["list", "dana"]))).unwrap();
    let stored: chrono::DateTime<Utc> = serde_json::from_value(listing[0]["expires_at"].clone()).unwrap();
    assert_eq!(stored.to_rfc3339_opts(SecondsFormat::Secs, true), expires);

    let past = (Utc::now() - Duration::minutes(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let output = admin(&file, &["grant", "dana", "customer.view", "--customer", "9", "--expires", &past]);
    assert!(!output.status.success());
    assert_eq!(check(&file, &["check", "dana", "customer.view", "--customer", "9"]), "deny");

    let garbled = admin(&file, &["grant", "dana", "customer.view", "--expires", "next tuesday"]);
    assert!(!garbled.status.success());

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}

#[test]
fn lapsed_grant_denies_unless_expiry_is_disabled() {
    let file = scratch_file();
    write_lapsed_grant(&file);

    assert_eq!(check(&file, &["check", "erin", "customer.view", "--customer", "3"]), "deny");

    let decision: serde_json::Value =
        serde_json::from_str(&stdout(&admin(&file, &["explain", "erin", "customer.view", "--customer", "3"]))).unwrap();
    assert_eq!(decision["granted"], false);
    assert_eq!(decision["reason"], "expired");

    assert_eq!(check(&file, &["--no-expiry", "check", "erin", "customer.view", "--customer", "3"]), "allow");
    assert_eq!(
        stdout(&admin_with_env(
            &file,
            &[("CLASSDESK_ENFORCE_EXPIRY", "false")],
            &["check", "erin", "customer.view", "--customer", "3"],
        ))
        .trim(),
        "allow"
    );

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}

#[test]
fn prune_removes_lapsed_grants_from_the_file() {
    let file = scratch_file();
    write_lapsed_grant(&file);
    stdout(&admin(&file, &["grant", "frank", "customer.edit"]));

    assert_eq!(check(&file, &["prune"]), "pruned 1");

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    let grants = saved["grants"].as_array().unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["user_id"], "frank");

    assert_eq!(check(&file, &["--no-expiry", "check", "erin", "customer.view"]), "deny");
    assert_eq!(check(&file, &["prune"]), "pruned 0");

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}

#[test]
fn regranting_a_lapsed_permission_restores_it() {
    let file = scratch_file();
    write_lapsed_grant(&file);

    let outcome: serde_json::Value =
        serde_json::from_str(&stdout(&admin(&file, &["grant", "erin", "customer.view"]))).unwrap();
    assert_eq!(outcome["changed"], json!(["customer.view"]));
    assert_eq!(check(&file, &["check", "erin", "customer.view"]), "allow");

    let listing: serde_json::Value = serde_json::from_str(&stdout(&admin(&file, &["list", "erin"]))).unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert!(listing[0].get("expires_at").is_none());

    std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
}
