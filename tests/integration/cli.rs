//! Integration tests for the inspection CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use trailmark::{SlotStore, SqliteStore, SystemClock};

/// The binary with its data directory inside `dir`
fn trailmark(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("trailmark").expect("Binary not built");
    cmd.arg("--data-dir").arg(dir.path());
    cmd
}

#[test]
fn test_decode_expands_folded_actions() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["decode", "!3a2+5.7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"offset_ticks\":12"))
        .stdout(predicate::str::contains("\"offset_ms\":1200"))
        .stdout(predicate::function(|out: &str| out.lines().count() == 3));
}

#[test]
fn test_decode_stops_at_truncated_tail() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["decode", "*1fs~5!1a1+"])
        .assert()
        .success()
        .stdout(predicate::function(|out: &str| out.lines().count() == 2));
}

#[test]
fn test_decode_saturates_huge_offsets() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["decode", "~18446744073709551615!1a1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "\"offset_ms\":18446744073709551615",
        ));
}

#[test]
fn test_hash_prints_space_token() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["hash", "/products/shoes/red"])
        .assert()
        .success()
        .stdout("*t88zd\n");
}

#[test]
fn test_config_aliases_and_tick() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        "[trace]\ntick_ms = 50\n\n[aliases]\n\"/home\" = \"home\"\n",
    )
    .unwrap();

    trailmark(&dir)
        .arg("--config")
        .arg(&config)
        .args(["hash", "/home"])
        .assert()
        .success()
        .stdout("*home\n");

    trailmark(&dir)
        .arg("--config")
        .arg(&config)
        .args(["decode", "!3a2+5.7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"offset_ms\":600"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .args(["hash", "/home"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn test_slot_record_as_json() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["slot", "2_1700000000000_k3x9a0_m_s_3_1_42_*1fs!1a1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"lifecycle\": \"stored\""))
        .stdout(predicate::str::contains("\"device\": \"mobile\""))
        .stdout(predicate::str::contains("\"trace\": \"*1fs!1a1\""));
}

#[test]
fn test_malformed_slot_record_fails() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["slot", "garbage"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed slot record"));
}

#[test]
fn test_epoch_record_as_json() {
    let dir = TempDir::new().unwrap();
    trailmark(&dir)
        .args(["epoch", "0000000000_5_abc123___1.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key\": \"abc123\""))
        .stdout(predicate::str::contains("\"bitfield\": \"0000000000\""));
}

#[test]
fn test_slots_dumps_store() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shared.db");
    let store = SqliteStore::open(db.clone(), Arc::new(SystemClock)).unwrap();
    store
        .write("tms1", "1_5_abc123_u_u_0_0_0_", Duration::from_secs(600))
        .unwrap();
    store
        .write("other", "ignored", Duration::from_secs(600))
        .unwrap();
    drop(store);

    trailmark(&dir)
        .arg("slots")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key\":\"tms1\""))
        .stdout(predicate::str::contains("other").not());
}
