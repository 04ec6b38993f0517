//! CLI integration tests
//!
//! Tests the databutton-app-mcp binary using assert_cmd. Legacy raw-JSON
//! keys resolve without any network round trip, so `--show-uri` can be
//! exercised end-to-end offline.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn databutton_app_mcp() -> Command {
    let mut cmd = Command::cargo_bin("databutton-app-mcp")
        .expect("Failed to locate databutton-app-mcp binary - ensure it's built before running tests");
    cmd.env_remove("DATABUTTON_API_KEY");
    cmd
}

fn key_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp key file");
    write!(file, "{contents}").expect("Failed to write temp key file");
    file
}

#[test]
fn test_cli_help() {
    databutton_app_mcp()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("databutton-app-mcp"))
        .stdout(predicate::str::contains(
            "Expose Databutton app endpoints as LLM tools",
        ))
        .stdout(predicate::str::contains("DATABUTTON_API_KEY"));
}

#[test]
fn test_cli_version() {
    databutton_app_mcp()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("databutton-app-mcp"));
}

#[test]
fn test_cli_fails_without_api_key() {
    databutton_app_mcp()
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key provided"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_fails_on_blank_api_key() {
    databutton_app_mcp()
        .env("DATABUTTON_API_KEY", "   ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("blank"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_fails_on_undecodable_api_key() {
    databutton_app_mcp()
        .env("DATABUTTON_API_KEY", "definitely not a key")
        .arg("--show-uri")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to interpret API key"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_show_uri_with_legacy_key_from_env() {
    databutton_app_mcp()
        .env(
            "DATABUTTON_API_KEY",
            r#"{"uri":"ws://localhost:8000/mcp/ws"}"#,
        )
        .arg("--show-uri")
        .assert()
        .success()
        .stdout(predicate::str::contains("would connect to:"))
        .stdout(predicate::str::contains("ws://localhost:8000/mcp/ws"));
}

#[test]
fn test_show_uri_with_legacy_key_from_file() {
    let file = key_file(r#"{"uri":"wss://example.com/mcp/ws","authCode":"secret"}"#);
    databutton_app_mcp()
        .args(["-k", &file.path().to_string_lossy(), "--show-uri"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wss://example.com/mcp/ws"));
}

#[test]
fn test_missing_key_file_falls_back_to_env() {
    databutton_app_mcp()
        .env(
            "DATABUTTON_API_KEY",
            r#"{"uri":"wss://example.com/mcp/ws"}"#,
        )
        .args(["-k", "/nonexistent/apikey.txt", "--show-uri"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wss://example.com/mcp/ws"));
}

#[test]
fn test_cli_rejects_disallowed_uri_scheme() {
    databutton_app_mcp()
        .env(
            "DATABUTTON_API_KEY",
            r#"{"uri":"http://example.com/not-a-websocket"}"#,
        )
        .arg("--show-uri")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to interpret API key"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_uri_override_takes_precedence() {
    databutton_app_mcp()
        .env(
            "DATABUTTON_API_KEY",
            r#"{"uri":"wss://example.com/mcp/ws"}"#,
        )
        .args(["--show-uri", "-u", "ws://localhost:9999/custom"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ws://localhost:9999/custom"));
}
