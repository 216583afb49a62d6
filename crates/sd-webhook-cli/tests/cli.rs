//! Binary-level tests for the `sd-webhook` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn sd_webhook() -> Command {
    let mut cmd = Command::cargo_bin("sd-webhook").unwrap();
    cmd.env_remove("SDW_CONFIG_FILE").env_remove("RUST_LOG");
    cmd
}

fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_lists_commands() {
    sd_webhook()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate-config"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("locate"));
}

#[test]
fn test_classify_prints_decision() {
    let delivery = temp_file(
        ".json",
        r#"{
            "webhookEvent": "jira:issue_updated",
            "issue_event_type_name": "issue_generic",
            "changelog": { "items": [
                { "field": "status", "fieldtype": "jira", "fromString": "Open", "toString": "Approved" }
            ]}
        }"#,
    );

    sd_webhook()
        .arg("classify")
        .arg(delivery.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("transition: Open -> Approved"));
}

#[test]
fn test_classify_missing_file_exits_with_io_code() {
    sd_webhook()
        .args(["classify", "/nonexistent/delivery.json"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_validate_config_via_environment() {
    let config = temp_file(
        ".yaml",
        "service_desk:\n  bot_name: automation\n  bot_password: pw\n",
    );

    sd_webhook()
        .arg("validate-config")
        .env("SDW_CONFIG_FILE", config.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Configuration is valid"));
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let config = temp_file(".yaml", "server:\n  port: 9000\n");

    sd_webhook()
        .arg("--config")
        .arg(config.path())
        .arg("validate-config")
        .env_remove("SDW_BOT_PASSWORD")
        .assert()
        .code(3);
}
