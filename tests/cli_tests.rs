//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_shows_usage() {
    Command::cargo_bin("voxnote")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("voice annotation").or(predicate::str::contains("Record")));
}

#[test]
fn version_prints() {
    Command::cargo_bin("voxnote")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("voxnote"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    Command::cargo_bin("voxnote")
        .unwrap()
        .arg("--definitely-not-a-flag")
        .assert()
        .failure();
}

#[test]
fn config_path_prints_the_settings_location() {
    Command::cargo_bin("voxnote")
        .unwrap()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn devices_subcommand_parses() {
    // May find zero devices in CI; only the exit path matters here.
    Command::cargo_bin("voxnote")
        .unwrap()
        .arg("devices")
        .assert()
        .code(predicate::in_iter([0, 1]));
}

#[test]
fn unknown_provider_fails_fast() {
    Command::cargo_bin("voxnote")
        .unwrap()
        .args(["--provider", "dragon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider"));
}
