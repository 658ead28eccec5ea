//! Command-line surface tests for the `mongoferry` binary.

#![allow(clippy::pedantic)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use mongoferry::settings::KEYS;

/// Binary isolated from the caller's environment, run inside `dir`.
fn mongoferry(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mongoferry").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    for key in KEYS {
        cmd.env_remove(key);
    }
    cmd
}

fn write_env(dir: &TempDir, contents: &str) {
    fs::write(dir.path().join(".env"), contents).unwrap();
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    mongoferry(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("setup"));
}

#[test]
fn test_migrate_help_lists_options() {
    let dir = TempDir::new().unwrap();
    mongoferry(&dir)
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source-dbs"))
        .stdout(predicate::str::contains("--drop-target"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    mongoferry(&dir).arg("replicate").assert().failure();
}

#[test]
fn test_invalid_batch_size_in_settings_fails() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        "SOURCE_MONGODB_URI=mongodb://localhost:27017\nTARGET_MONGODB_URI=mongodb://localhost:27018\nBATCH_SIZE=lots\n",
    );

    mongoferry(&dir)
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BATCH_SIZE"));
}

#[test]
fn test_zero_batch_size_flag_fails_before_connecting() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        "SOURCE_MONGODB_URI=mongodb://localhost:27017\nTARGET_MONGODB_URI=mongodb://localhost:27018\n",
    );

    mongoferry(&dir)
        .args(["migrate", "-b", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batchSize"));
}

#[test]
fn test_analyze_without_source_uri_fails() {
    let dir = TempDir::new().unwrap();

    mongoferry(&dir)
        .args(["analyze", "--env-file", "missing.env"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("source.uri"));
}

#[test]
fn test_migrate_rejects_non_mongodb_uri() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        "SOURCE_MONGODB_URI=postgres://localhost/db\nTARGET_MONGODB_URI=mongodb://localhost:27018\n",
    );

    mongoferry(&dir)
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("mongodb://"));
}

#[test]
fn test_run_writes_log_file() {
    let dir = TempDir::new().unwrap();

    mongoferry(&dir)
        .args(["analyze", "--log-dir", "run-logs"])
        .assert()
        .failure();

    let logs: Vec<_> = fs::read_dir(dir.path().join("run-logs"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("migration-"));
    assert!(logs[0].ends_with(".log"));
}
