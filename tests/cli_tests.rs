//! CLI surface checks: help output and configuration bootstrap.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_operational_commands() {
    let mut cmd = Command::cargo_bin("deal-desk").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("doctor"))
        .stdout(predicate::str::contains("ensure"));
}

#[test]
fn ensure_help_documents_the_url_flag() {
    let mut cmd = Command::cargo_bin("deal-desk").unwrap();
    cmd.args(["ensure", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--url"))
        .stdout(predicate::str::contains("drive"));
}

#[test]
fn init_writes_a_starter_configuration() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("deal-desk").unwrap();
    cmd.current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("deal-desk.toml"));

    let written = std::fs::read_to_string(dir.path().join("deal-desk.toml")).unwrap();
    assert!(written.contains("[graph]"));
    assert!(written.contains("authority_base"));

    // A second init without --force leaves the file alone.
    let mut again = Command::cargo_bin("deal-desk").unwrap();
    again
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}
