//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;

/// Build command for the copperscan-cli binary (finds it in target/debug when run via cargo test).
fn copperscan_cli() -> Command {
    cargo_bin_cmd!("copperscan-cli")
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = copperscan_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PCB"));
}

#[test]
fn test_cli_version() {
    let mut cmd = copperscan_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_clean_board() {
    let mut cmd = copperscan_cli();

    cmd.arg("check").arg(fixtures_dir().join("clean_board.json"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0 violations found"));
}

#[test]
fn test_cli_check_thin_line() {
    let mut cmd = copperscan_cli();

    cmd.arg("check").arg(fixtures_dir().join("thin_line.json"));
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Line width is too thin"))
        .stdout(predicate::str::contains("1 violation found"));
}

#[test]
fn test_cli_check_json_output() {
    let mut cmd = copperscan_cli();

    cmd.arg("check")
        .arg(fixtures_dir().join("thin_line.json"))
        .arg("--format")
        .arg("json");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("\"violation_count\": 1"))
        .stdout(predicate::str::contains("Line width is too thin"));
}

#[test]
fn test_cli_check_first_only_aborts() {
    let mut cmd = copperscan_cli();

    cmd.arg("check")
        .arg(fixtures_dir().join("thin_line.json"))
        .arg("--first-only");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("check aborted"));
}

#[test]
fn test_cli_nets() {
    let mut cmd = copperscan_cli();

    cmd.arg("nets").arg(fixtures_dir().join("clean_board.json"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 net total"))
        .stdout(predicate::str::contains("pin/via #0"));
}

#[test]
fn test_cli_connected() {
    let mut cmd = copperscan_cli();

    cmd.arg("connected")
        .arg(fixtures_dir().join("clean_board.json"))
        .arg("-x")
        .arg("0")
        .arg("-y")
        .arg("0");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Seed: pin/via #0"))
        .stdout(predicate::str::contains("2 connected objects"));
}

#[test]
fn test_cli_connected_empty_spot() {
    let mut cmd = copperscan_cli();

    cmd.arg("connected")
        .arg(fixtures_dir().join("clean_board.json"))
        .arg("-x")
        .arg("900000")
        .arg("-y")
        .arg("900000");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("no copper object"));
}

#[test]
fn test_cli_check_rejects_bad_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "not a board").unwrap();

    let mut cmd = copperscan_cli();
    cmd.arg("check").arg(file.path());
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_check_missing_file() {
    let mut cmd = copperscan_cli();

    cmd.arg("check").arg("no_such_board.json");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}
