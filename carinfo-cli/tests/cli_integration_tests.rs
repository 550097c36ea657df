//! Integration tests for CarInfo CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const POLICY_ENV: [&str; 3] = ["CARINFO_POLICY_MODE", "CARINFO_OPA_URL", "CARINFO_CONFIG"];

fn carinfo() -> Command {
    let mut cmd = Command::cargo_bin("carinfo").unwrap();
    for var in POLICY_ENV {
        cmd.env_remove(var);
    }
    cmd
}

fn write_snapshot(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("data.json");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_cli_version() {
    carinfo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("carinfo"));
}

#[test]
fn test_cli_help() {
    carinfo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("policy-gated car inventory"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("decide"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_decide_open_mode_allows() {
    carinfo()
        .args(["decide", "--resource", "cars/car3/status", "--action", "GET"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOWED"))
        .stdout(predicate::str::contains("open"));
}

#[test]
fn test_decide_deny_all_exits_with_two() {
    carinfo()
        .args(["decide", "--resource", "cars", "--action", "POST"])
        .args(["--mode", "deny-all", "--subject", "mallory"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("DENIED"))
        .stdout(predicate::str::contains("mallory"));
}

#[test]
fn test_decide_json_format() {
    let output = carinfo()
        .args(["decide", "--resource", "/cars/car0/", "--action", "delete"])
        .args(["--mode", "allow-all", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["allowed"], true);
    assert_eq!(json["input"]["resource"], serde_json::json!(["cars", "car0"]));
    assert_eq!(json["input"]["action"], "DELETE");
    assert_eq!(json["input"]["subject"], serde_json::Value::Null);
}

#[test]
fn test_decide_http_mode_requires_url() {
    carinfo()
        .args(["decide", "--resource", "cars", "--action", "GET", "--mode", "http"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid policy configuration"));
}

#[test]
fn test_decide_unreachable_policy_denies() {
    carinfo()
        .args(["decide", "--resource", "cars", "--action", "GET"])
        .args(["--opa-url", "http://127.0.0.1:1/v1/data/httpapi/authz"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("DENIED"));
}

#[test]
fn test_decide_rejects_unknown_mode() {
    carinfo()
        .args(["decide", "--resource", "cars", "--action", "GET", "--mode", "maybe"])
        .assert()
        .failure();
}

#[test]
fn test_inspect_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");

    carinfo()
        .arg("inspect")
        .arg("--data")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cars: 0"))
        .stdout(predicate::str::contains("Next identifier: car0"));
}

#[test]
fn test_inspect_reports_orphaned_statuses() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(
        &dir,
        r#"{
            "cars": {
                "car0": {"make": "Honda", "model": "Civic", "year": 2010, "color": "red"},
                "car2": {"make": "Ford", "model": "Focus", "year": 2015, "color": "blue"}
            },
            "statuses": {
                "car0": {"ready": true, "sold": false, "price": 5000.0},
                "car9": {"ready": false, "sold": true, "price": 1.5}
            }
        }"#,
    );

    carinfo()
        .arg("inspect")
        .arg("--data")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cars: 2"))
        .stdout(predicate::str::contains("Statuses: 2"))
        .stdout(predicate::str::contains("Next identifier: car1"))
        .stdout(predicate::str::contains("car9"));
}

#[test]
fn test_inspect_json_format() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(
        &dir,
        r#"{"cars": {"car0": {"make": "Honda", "model": "Civic", "year": 2010, "color": "red"}}, "statuses": {}}"#,
    );

    let output = carinfo()
        .arg("inspect")
        .arg("--data")
        .arg(&path)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["cars"], 1);
    assert_eq!(json["statuses"], 0);
    assert_eq!(json["next_identifier"], "car1");
    assert_eq!(json["orphaned_statuses"], serde_json::json!([]));
}

#[test]
fn test_inspect_corrupt_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(&dir, "{not json");

    carinfo()
        .arg("inspect")
        .arg("--data")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn test_serve_rejects_bad_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("carinfo.toml");
    fs::write(&config, "[server]\nunknown_key = 1\n").unwrap();

    carinfo()
        .arg("serve")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
