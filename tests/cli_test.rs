#![allow(deprecated)]

//! Binary-level tests for argument handling and configuration errors
use assert_cmd::Command;
use predicates::prelude::*;
mod common;

const SIGNED_OUT_CONFIG: &str = "backend:\n  url: http://127.0.0.1:9\n  anon_key: anon\nauth:\n  persist_session: false\n";

fn studydash() -> Command {
    let mut cmd = Command::cargo_bin("studydash").unwrap();
    for var in [
        "STUDYDASH_BACKEND_URL",
        "STUDYDASH_ANON_KEY",
        "STUDYDASH_PERSIST_SESSION",
        "STUDYDASH_LOG_LEVEL",
        "STUDYDASH_PASSWORD",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    studydash()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("timer"));
}

#[test]
fn test_timer_format_prints_hms() {
    studydash()
        .args(["timer", "format", "3661"])
        .assert()
        .success()
        .stdout("01:01:01\n");
}

#[test]
fn test_timer_format_hours_are_not_wrapped() {
    studydash()
        .args(["timer", "format", "90000"])
        .assert()
        .success()
        .stdout("25:00:00\n");
}

#[test]
fn test_invalid_backend_url_is_rejected() {
    let (_temp_dir, config_path) = common::temp_config_file("backend:\n  url: not a url\n");

    studydash()
        .arg("--config")
        .arg(config_path)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid backend url"));
}

#[test]
fn test_missing_anon_key_is_reported() {
    let (_temp_dir, config_path) = common::temp_config_file(
        "backend:\n  url: http://127.0.0.1:9\nauth:\n  persist_session: false\n",
    );

    studydash()
        .arg("--config")
        .arg(config_path)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("anon_key"));
}

#[test]
fn test_auth_status_when_signed_out() {
    let (_temp_dir, config_path) = common::temp_config_file(SIGNED_OUT_CONFIG);

    studydash()
        .arg("--config")
        .arg(config_path)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[test]
fn test_sessions_list_requires_sign_in() {
    let (_temp_dir, config_path) = common::temp_config_file(SIGNED_OUT_CONFIG);

    studydash()
        .arg("--config")
        .arg(config_path)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("studydash auth login"));
}

#[test]
fn test_join_rejects_malformed_id() {
    studydash()
        .args(["sessions", "join", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn test_login_without_terminal_asks_for_password_flag() {
    let (_temp_dir, config_path) = common::temp_config_file(SIGNED_OUT_CONFIG);

    studydash()
        .arg("--config")
        .arg(config_path)
        .args(["auth", "login", "--email", "ada@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STUDYDASH_PASSWORD"));
}
