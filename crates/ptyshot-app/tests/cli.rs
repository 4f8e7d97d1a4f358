use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_tokenization() {
    Command::cargo_bin("ptyshot")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("split on whitespace only"));
}

#[test]
fn missing_command_is_a_usage_error() {
    Command::cargo_bin("ptyshot")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn whitespace_command_fails_without_running() {
    Command::cargo_bin("ptyshot")
        .unwrap()
        .arg("   ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error executing command: empty command"));
}
