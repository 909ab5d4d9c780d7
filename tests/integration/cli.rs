//! Integration tests for the snapreport binary

use std::fs;

use assert_cmd::Command;
use axum::http::StatusCode;
use predicates::prelude::*;
use tempfile::TempDir;

use super::common::spawn_collector;

fn snapreport(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("snapreport").expect("Binary should be built");
    cmd.arg("--data-dir")
        .arg(data_dir.path())
        .env_remove("SNAPREPORT_API_KEY")
        .env_remove("SNAPREPORT_API_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("snapreport.toml");
    fs::write(&path, contents).expect("Failed to write config");
    path
}

/// `config` prints the merged configuration without leaking the key
#[test]
fn test_config_command_prints_effective_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "api_key = \"super-secret\"\n\n[network]\nmax_entries = 7\n",
    );

    snapreport(&dir)
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_entries\": 7"))
        .stdout(predicate::str::contains("\"api_key\": \"<set>\""))
        .stdout(predicate::str::contains("super-secret").not());
}

/// First run writes the bundled example config into the data dir
#[test]
fn test_first_run_creates_default_config() {
    let dir = TempDir::new().unwrap();

    snapreport(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"poll_interval_ms\": 1000"));

    let written = fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains("[replay]"));
}

/// Invalid bounds are rejected with a readable error
#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[replay]\nmax_polls = 0\n");

    snapreport(&dir)
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("replay.max_polls must be greater than 0"));
}

/// Sending without an API key fails before anything is captured
#[test]
fn test_send_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    snapreport(&dir)
        .arg("--config")
        .arg(&config)
        .args(["send", "--description", "It broke"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no API key configured"));
}

/// Malformed custom data is a usage error
#[test]
fn test_send_rejects_malformed_custom_data() {
    let dir = TempDir::new().unwrap();

    snapreport(&dir)
        .args(["send", "--description", "x", "--custom", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

/// `send` delivers a silent report with the structured page snapshot
#[tokio::test(flavor = "multi_thread")]
async fn test_send_submits_report_to_collector() {
    let collector = spawn_collector(StatusCode::CREATED).await;
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!("api_url = \"{}\"\napi_key = \"cli-key\"\n", collector.url),
    );
    let html = dir.path().join("page.html");
    fs::write(&html, "<html><body><h1>Checkout</h1></body></html>").unwrap();

    let mut cmd = snapreport(&dir);
    cmd.arg("--config")
        .arg(&config)
        .args([
            "send",
            "--description",
            "Pay button does nothing",
            "--email",
            "qa@example.com",
            "--priority",
            "high",
            "--type",
            "feature-request",
            "--url",
            "https://shop.test/checkout",
            "--custom",
            "plan=pro",
        ])
        .arg("--html")
        .arg(&html);

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("Report submitted"));

    let received = collector.received();
    assert_eq!(received.len(), 1);
    let body = &received[0].body;
    assert_eq!(received[0].api_token.as_deref(), Some("cli-key"));
    assert_eq!(body["priority"], "HIGH");
    assert_eq!(body["type"], "FEATURE_REQUEST");
    assert_eq!(body["customData"]["plan"], "pro");
    assert_eq!(body["formData"]["email"], "qa@example.com");
    assert_eq!(body["metaData"]["currentUrl"], "https://shop.test/checkout");
    assert!(body["screenshotData"]["html"]
        .as_str()
        .unwrap()
        .contains("Checkout"));
}
