//! End-to-end tests for `rover sniff`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn fixture(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_sniff_plain_csv() {
    let file = fixture(b"a,b,c\n1,2,3\n4,5,6\n");

    let output = Command::cargo_bin("rover")
        .unwrap()
        .arg("sniff")
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let hints: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(hints["field-delimiter"], ",");
    assert_eq!(hints["compression"], serde_json::Value::Null);
    assert_eq!(hints["encoding"], "UTF8");
}

#[test]
fn test_sniff_honors_initial_hints() {
    let file = fixture(b"a|b\n1|2\n");

    let output = Command::cargo_bin("rover")
        .unwrap()
        .args(["sniff", "--hint", "header-row=false"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let hints: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(hints["field-delimiter"], "|");
    assert_eq!(hints["header-row"], false);
}

#[test]
fn test_sniff_rejects_unknown_hint() {
    let file = fixture(b"a,b\n");

    Command::cargo_bin("rover")
        .unwrap()
        .args(["sniff", "--hint", "fluffiness=11"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("fluffiness"));
}

#[test]
fn test_sniff_missing_file() {
    Command::cargo_bin("rover")
        .unwrap()
        .args(["sniff", "/no/such/file.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open"));
}
