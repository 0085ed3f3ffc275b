//! Integration tests for the `fortiwatch` binary.
//!
//! Argument parsing, help, completions and error handling need no
//! gateway. Read commands run against a wiremock gateway, or against
//! nothing at all to exercise the fallback path.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// A `fortiwatch` command with env isolation.
///
/// Clears `FORTIWATCH_*` variables and points config and cache
/// directories into `home` so tests never touch real configuration.
fn fortiwatch_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fortiwatch");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_CACHE_HOME", home.path().join("cache"))
        .env("NO_COLOR", "1");
    for var in [
        "FORTIWATCH_PROFILE",
        "FORTIWATCH_GATEWAY",
        "FORTIWATCH_TOKEN",
        "FORTIWATCH_VDOM",
        "FORTIWATCH_OUTPUT",
        "FORTIWATCH_INSECURE",
        "FORTIWATCH_TIMEOUT",
        "FORTIWATCH_CACHE_DIR",
        "FORTIWATCH_LISTEN",
        "FORTIWATCH_DEFAULT_PROFILE",
        "FORTIWATCH_USERNAME",
        "FORTIWATCH_PASSWORD",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn envelope(results: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "serial": "FG60FTK00000001",
        "version": "v7.4.3",
        "results": results
    }))
}

async fn mount(server: &MockServer, route: &str, results: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(envelope(results))
        .mount(server)
        .await;
}

async fn mock_gateway() -> MockServer {
    let server = MockServer::start().await;
    mount(
        &server,
        "/api/v2/monitor/system/status",
        json!({ "hostname": "FGT-Lab", "model_name": "FortiGate-60F" }),
    )
    .await;
    mount(
        &server,
        "/api/v2/monitor/wifi/managed_ap",
        json!([
            { "name": "AP-Lobby", "serial": "FP231F0001", "status": "connected", "clients": 4 },
            { "name": "AP-Attic", "serial": "FP231F0003", "status": "disconnected" }
        ]),
    )
    .await;
    mount(
        &server,
        "/api/v2/monitor/switch-controller/managed-switch/status",
        json!([{
            "switch-id": "SW-Core-01",
            "model": "FS-448E-FPOE",
            "status": "Connected",
            "fan_status": "ok",
            "ports": [{ "interface": "port1", "fgt_peer_device_name": "AP-Lobby", "status": "up" }]
        }]),
    )
    .await;
    mount(&server, "/api/v2/monitor/user/device/query", json!([])).await;
    mount(&server, "/api/v2/monitor/system/resource/usage", json!({})).await;
    server
}

/// Run a prepared command off the async runtime so the mock server
/// keeps serving.
async fn output_of(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = fortiwatch_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("serve")
            .and(predicate::str::contains("aps"))
            .and(predicate::str::contains("switches"))
            .and(predicate::str::contains("topology")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fortiwatch"));
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_status_without_gateway_fails() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No gateway configured"));
}

#[test]
fn test_unknown_profile_is_reported() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .args(["--profile", "nope", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'nope' not found"));
}

#[test]
fn test_missing_token_exits_with_auth_code() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .args(["--gateway", "https://192.0.2.1", "aps"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}

#[test]
fn test_bad_interval_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .args([
            "--gateway",
            "https://192.0.2.1",
            "--token",
            "t",
            "serve",
            "--interval",
            "soon",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_config_path_and_show() {
    let home = TempDir::new().unwrap();
    fortiwatch_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    fortiwatch_cmd(&home)
        .args(["config", "show"])
        .env("FORTIWATCH_PROFILES__LAB__GATEWAY", "https://10.0.0.1")
        .env("FORTIWATCH_PROFILES__LAB__TOKEN", "super-secret")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.lab]")
                .and(predicate::str::contains("token = \"****\""))
                .and(predicate::str::contains("super-secret").not()),
        );
}

// ── Read commands ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_aps_json_from_live_gateway() {
    let server = mock_gateway().await;
    let home = TempDir::new().unwrap();

    let cache = home.path().join("fw-cache");

    let mut cmd = fortiwatch_cmd(&home);
    cmd.args(["--gateway", &server.uri(), "--token", "t", "-o", "json", "aps"])
        .arg("--cache-dir")
        .arg(&cache);
    let output = output_of(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let aps: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = aps
        .as_array()
        .unwrap()
        .iter()
        .map(|ap| ap["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["AP-Lobby", "AP-Attic"]);
    assert_eq!(aps[1]["status"], "down");

    // Live payloads are persisted for the next cold start.
    assert!(cache.join("fortiaps.json").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_alerts_filter_and_plain_output() {
    let server = mock_gateway().await;
    let home = TempDir::new().unwrap();

    let mut cmd = fortiwatch_cmd(&home);
    cmd.args([
        "--gateway",
        &server.uri(),
        "--token",
        "t",
        "-o",
        "plain",
        "alerts",
        "--min-severity",
        "high",
    ]);
    let output = output_of(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "{stdout}");
    assert!(lines[0].starts_with("high\tAP-Attic\t"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_topology_plain_lists_node_ids() {
    let server = mock_gateway().await;
    let home = TempDir::new().unwrap();

    let mut cmd = fortiwatch_cmd(&home);
    cmd.args(["--gateway", &server.uri(), "--token", "t", "-o", "plain", "topology"]);
    let output = output_of(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    for id in ["gateway", "switch:SW-Core-01", "ap:AP-Lobby", "ap:AP-Attic"] {
        assert!(stdout.lines().any(|l| l == id), "missing {id} in\n{stdout}");
    }
}

#[test]
fn test_unreachable_gateway_serves_fallback() {
    let home = TempDir::new().unwrap();
    let cache = home.path().join("fw-cache");

    // Port 9 on localhost refuses connections; one attempt per resource.
    fortiwatch_cmd(&home)
        .env("FORTIWATCH_DEFAULT_PROFILE", "lab")
        .env("FORTIWATCH_PROFILES__LAB__GATEWAY", "http://127.0.0.1:9")
        .env("FORTIWATCH_PROFILES__LAB__TOKEN", "t")
        .env("FORTIWATCH_PROFILES__LAB__RETRIES", "1")
        .args(["--cache-dir", cache.to_str().unwrap(), "-o", "json", "status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"data_source\": \"fallback\"")
                .and(predicate::str::contains("\"faulted\": true")),
        );

    // Fallback data is never written to the disk cache.
    assert!(!cache.join("fortiaps.json").exists());
}
