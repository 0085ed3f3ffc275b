#![allow(clippy::unwrap_used)]
// End-to-end refresh cycles against a mocked gateway.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use fortiwatch_api::{Resource, RetryPolicy};
use fortiwatch_core::model::{GATEWAY_NODE_ID, SYSTEM_ALERT_SOURCE};
use fortiwatch_core::{
    AlertKind, AuthCredentials, Channel, DataSource, DiskCache, MonitorConfig, Orchestrator,
    RefreshOutcome, RefreshState, Severity, SourceOrigin, Trigger,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer, cache_dir: Option<&Path>) -> MonitorConfig {
    let mut cfg = MonitorConfig::new(
        server.uri().parse().unwrap(),
        AuthCredentials::ApiToken(SecretString::from("test-token".to_owned())),
    );
    cfg.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
    };
    cfg.timeout = Duration::from_secs(2);
    cfg.refresh_interval = Duration::ZERO;
    cfg.cache.dir = cache_dir.map(Path::to_path_buf);
    cfg
}

fn envelope(results: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "http_method": "GET",
        "status": "success",
        "vdom": "root",
        "serial": "FG60FTK00000001",
        "version": "v7.4.3",
        "build": 2573,
        "results": results
    }))
}

fn healthy_aps() -> Value {
    json!([
        { "name": "AP-Lobby", "serial": "FP231F0001", "status": "connected", "clients": 4, "temperature": 41 },
        { "name": "AP-Office", "serial": "FP231F0002", "status": "connected", "clients": 9 }
    ])
}

fn healthy_switches() -> Value {
    json!([{
        "switch-id": "SW-Core-01",
        "serial": "S448EF0001",
        "model": "FS-448E-FPOE",
        "status": "Connected",
        "temperature": 38,
        "fan_status": "ok",
        "poe_power_budget": 740,
        "ports": [
            { "interface": "port1", "fgt_peer_device_name": "AP-Lobby", "status": "up", "poe_power": 6.5 },
            { "interface": "port2", "fgt_peer_device_name": "FP231F0002", "status": "up", "poe_power": 7.0 }
        ]
    }])
}

async fn mount(server: &MockServer, resource: Resource, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(resource.path()))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_fleet(server: &MockServer, aps: Value, switches: Value) {
    mount(server, Resource::SystemStatus, envelope(json!({ "hostname": "FGT-Lab", "model_name": "FortiGate-60F" }))).await;
    mount(server, Resource::AccessPoints, envelope(aps)).await;
    mount(server, Resource::Switches, envelope(switches)).await;
    mount(server, Resource::Endpoints, envelope(json!([
        { "mac": "a4:83:e7:00:00:10", "hostname": "laptop", "is_online": true, "ap_name": "AP-Office" }
    ]))).await;
    mount(server, Resource::ResourceUsage, envelope(json!({}))).await;
}

async fn mount_all_failing(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn run(orchestrator: &Orchestrator) -> fortiwatch_core::CycleReport {
    match orchestrator.trigger(Trigger::Manual).await {
        RefreshOutcome::Completed(report) => report,
        RefreshOutcome::Rejected => panic!("cycle unexpectedly rejected"),
    }
}

// ── Live path ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_cycle_publishes_everything() {
    let server = MockServer::start().await;
    mount_fleet(&server, healthy_aps(), healthy_switches()).await;
    let dir = tempfile::tempdir().unwrap();

    let orchestrator = Orchestrator::new(config(&server, Some(dir.path()))).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.cycle, 1);
    assert_eq!(report.data_source, DataSource::Live);
    assert!(!report.faulted);
    assert_eq!(orchestrator.current_state(), RefreshState::Idle);

    let snapshot = orchestrator.latest().unwrap();
    assert_eq!(snapshot.gateway.hostname, "FGT-Lab");
    assert_eq!(snapshot.gateway.serial, "FG60FTK00000001");
    assert_eq!(snapshot.access_points.len(), 2);
    assert_eq!(snapshot.switches[0].name, "SW-Core-01");
    assert!(snapshot.alerts.is_empty(), "{:?}", snapshot.alerts);
    assert_eq!(snapshot.metrics.total_clients, 13);
    assert!(snapshot.access_points.iter().all(|ap| !ap.synthetic));

    snapshot.topology.validate().unwrap();
    let lobby = snapshot.topology.parent_edge("ap:AP-Lobby").unwrap();
    assert_eq!((lobby.from.as_str(), lobby.via.as_str()), ("switch:SW-Core-01", "port1"));
    let office = snapshot.topology.parent_edge("ap:AP-Office").unwrap();
    assert_eq!(office.via, "port2");
    let laptop = snapshot.topology.parent_edge("endpoint:a4:83:e7:00:00:10").unwrap();
    assert_eq!(laptop.from, "ap:AP-Office");

    for channel in Channel::PUBLISHED {
        let frame: Value = serde_json::from_str(&orchestrator.hub().latest(channel).unwrap()).unwrap();
        assert_eq!(frame["type"], format!("{channel}:update"));
        assert_eq!(frame["cycle"], 1);
    }
    assert_eq!(orchestrator.history().len(), 1);

    // Every live payload was persisted for the next process.
    for resource in [Resource::AccessPoints, Resource::Switches, Resource::SystemStatus] {
        assert!(dir.path().join(format!("{}.json", resource.cache_key())).exists());
    }
}

// ── Scenario A: partial failure served from disk ───────────────────

#[tokio::test]
async fn test_switch_failure_falls_back_to_disk_cache() {
    let dir = tempfile::tempdir().unwrap();

    let first = MockServer::start().await;
    mount_fleet(&first, healthy_aps(), healthy_switches()).await;
    run(&Orchestrator::new(config(&first, Some(dir.path()))).unwrap()).await;

    // A fresh process: empty memory tier, same disk directory.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(Resource::Switches.path()))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount(&server, Resource::SystemStatus, envelope(json!({ "hostname": "FGT-Lab" }))).await;
    mount(&server, Resource::AccessPoints, envelope(healthy_aps())).await;
    mount(&server, Resource::Endpoints, envelope(json!([]))).await;
    mount(&server, Resource::ResourceUsage, envelope(json!({}))).await;

    let orchestrator = Orchestrator::new(config(&server, Some(dir.path()))).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.data_source, DataSource::Cache);
    assert_eq!(report.sources.origin(Resource::AccessPoints), Some(SourceOrigin::Live));
    assert!(matches!(
        report.sources.origin(Resource::Switches),
        Some(SourceOrigin::DiskCache { .. })
    ));

    let snapshot = orchestrator.latest().unwrap();
    assert_eq!(snapshot.switches.len(), 1);
    assert_eq!(snapshot.switches[0].name, "SW-Core-01");
    assert!(!snapshot.switches[0].synthetic);

    let system: Vec<_> = snapshot.alerts.iter().filter(|a| a.is_system()).collect();
    assert_eq!(system.len(), 1);
    assert_eq!(system[0].severity, Severity::Low);
    assert_eq!(system[0].kind, AlertKind::Info);
    assert!(system[0].message.contains("fortiswitches"));
    assert_eq!(snapshot.alerts.len(), 1);
}

#[tokio::test]
async fn test_memory_tier_serves_within_the_same_process() {
    let server = MockServer::start().await;
    mount_fleet(&server, healthy_aps(), healthy_switches()).await;
    let orchestrator = Orchestrator::new(config(&server, None)).unwrap();
    run(&orchestrator).await;

    server.reset().await;
    mount_all_failing(&server, 500).await;
    let report = run(&orchestrator).await;

    assert_eq!(report.cycle, 2);
    assert_eq!(report.data_source, DataSource::Cache);
    assert!(
        report
            .sources
            .origins
            .values()
            .all(|o| matches!(o, SourceOrigin::MemoryCache { .. }))
    );
    assert_eq!(orchestrator.latest().unwrap().access_points.len(), 2);
    assert_eq!(orchestrator.history().len(), 2);

    // Viewers get the whole ring on the history channel.
    let frame: Value =
        serde_json::from_str(&orchestrator.hub().latest(Channel::History).unwrap()).unwrap();
    let sources: Vec<&str> = frame["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["data_source"].as_str().unwrap())
        .collect();
    assert_eq!(sources, ["live", "cache"]);
    assert_eq!(frame["data"][1]["cycle"], 2);
}

// ── Scenario B: one switch, four alerts ────────────────────────────

#[tokio::test]
async fn test_unhealthy_switch_yields_four_alerts() {
    let server = MockServer::start().await;
    mount_fleet(
        &server,
        json!([]),
        json!([{
            "name": "SW1",
            "status": "warning",
            "temperature": 70,
            "poe_power_percentage": 85,
            "fan_status": "warning"
        }]),
    )
    .await;

    let orchestrator = Orchestrator::new(config(&server, None)).unwrap();
    run(&orchestrator).await;
    let snapshot = orchestrator.latest().unwrap();

    assert_eq!(snapshot.alerts.len(), 4);
    assert!(snapshot.alerts.iter().all(|a| a.device == "SW1"));
    assert_eq!(snapshot.metrics.switches.warning, 1);
}

// ── Scenario C: unresolvable AP ─────────────────────────────────────

#[tokio::test]
async fn test_unmatched_ap_hangs_off_core_with_synthesized_port() {
    let server = MockServer::start().await;
    mount_fleet(
        &server,
        json!([{ "name": "AP-Roof", "model": "FAP-432F", "status": "connected" }]),
        json!([
            { "name": "SW-Edge", "model": "FS-108F", "status": "up" },
            { "name": "SW-Agg", "model": "FS-1048E", "status": "up",
              "ports": [{ "port": "port3", "connected_device": "SW-Edge", "link": "up" }] }
        ]),
    )
    .await;

    let orchestrator = Orchestrator::new(config(&server, None)).unwrap();
    run(&orchestrator).await;
    let topology = &orchestrator.latest().unwrap().topology;

    topology.validate().unwrap();
    let edge = topology.parent_edge("ap:AP-Roof").unwrap();
    assert_eq!(edge.from, "switch:SW-Agg");
    assert!(edge.synthesized);
    assert_eq!(edge.via, "port4");
    assert_eq!(topology.parent_edge("switch:SW-Agg").unwrap().from, GATEWAY_NODE_ID);
}

// ── Single flight ───────────────────────────────────────────────────

#[tokio::test]
async fn test_overlapping_trigger_is_rejected() {
    let server = MockServer::start().await;
    mount(
        &server,
        Resource::AccessPoints,
        envelope(healthy_aps()).set_delay(Duration::from_millis(300)),
    )
    .await;
    mount(&server, Resource::SystemStatus, envelope(json!({}))).await;
    mount(&server, Resource::Switches, envelope(healthy_switches())).await;
    mount(&server, Resource::Endpoints, envelope(json!([]))).await;
    mount(&server, Resource::ResourceUsage, envelope(json!({}))).await;

    let orchestrator = Orchestrator::new(config(&server, None)).unwrap();
    let mut state = orchestrator.state();

    let (first, second) = tokio::join!(
        orchestrator.trigger(Trigger::Manual),
        orchestrator.trigger(Trigger::Timer),
    );
    assert!(matches!(first, RefreshOutcome::Completed(_)));
    assert!(matches!(second, RefreshOutcome::Rejected));
    assert_eq!(orchestrator.cycle_count(), 1);

    assert!(state.has_changed().unwrap());
    assert_eq!(*state.borrow_and_update(), RefreshState::Idle);

    // Once idle, the next trigger runs.
    assert!(matches!(
        orchestrator.trigger(Trigger::Manual).await,
        RefreshOutcome::Completed(_)
    ));
    assert_eq!(orchestrator.cycle_count(), 2);
}

// ── Degraded to the static dataset ──────────────────────────────────

#[tokio::test]
async fn test_total_outage_serves_fallback_and_faults() {
    let server = MockServer::start().await;
    mount_all_failing(&server, 502).await;

    let orchestrator = Orchestrator::new(config(&server, None)).unwrap();
    let report = run(&orchestrator).await;

    assert!(report.faulted);
    assert_eq!(report.data_source, DataSource::Fallback);
    assert_eq!(orchestrator.current_state(), RefreshState::Idle);

    let snapshot = orchestrator.latest().unwrap();
    assert!(snapshot.faulted);
    assert!(!snapshot.access_points.is_empty());
    assert!(snapshot.access_points.iter().all(|ap| ap.synthetic));
    assert!(snapshot.switches.iter().all(|sw| sw.synthetic));
    snapshot.topology.validate().unwrap();

    let first = &snapshot.alerts[0];
    assert_eq!(first.device, SYSTEM_ALERT_SOURCE);
    assert_eq!(first.severity, Severity::High);
    assert_eq!(first.kind, AlertKind::Error);
    assert!(first.message.contains("2025.06.1"), "{}", first.message);

    // Three attempts per resource, five resources.
    assert_eq!(server.received_requests().await.unwrap().len(), 15);
}

#[tokio::test]
async fn test_client_errors_are_not_retried_before_fallback() {
    let server = MockServer::start().await;
    mount_all_failing(&server, 404).await;

    let orchestrator = Orchestrator::new(config(&server, None)).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.data_source, DataSource::Fallback);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_stale_disk_snapshot_is_reported_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let disk = DiskCache::new(dir.path(), Duration::from_secs(24 * 60 * 60));
    let two_days_ago = Utc::now() - chrono::Duration::days(2);
    disk.write_at(Resource::Switches.cache_key(), &healthy_switches(), two_days_ago)
        .await
        .unwrap();

    let server = MockServer::start().await;
    mount_all_failing(&server, 500).await;

    let orchestrator = Orchestrator::new(config(&server, Some(dir.path()))).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.sources.origin(Resource::Switches), Some(SourceOrigin::Fallback));
    assert!(report.sources.stale_disk_secs.contains_key(&Resource::Switches));

    let alert = &orchestrator.latest().unwrap().alerts[0];
    assert!(alert.message.contains("stale"), "{}", alert.message);
    // The fallback switch list, not the stale one.
    assert!(orchestrator.latest().unwrap().switches.iter().all(|s| s.synthetic));
}

#[tokio::test]
async fn test_missing_fallback_yields_error_source() {
    let server = MockServer::start().await;
    mount_all_failing(&server, 500).await;
    let dir = tempfile::tempdir().unwrap();

    let mut cfg = config(&server, None);
    cfg.fallback_path = Some(dir.path().join("missing.json"));
    let orchestrator = Orchestrator::new(cfg).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.data_source, DataSource::Error);
    assert!(report.faulted);

    let snapshot = orchestrator.latest().unwrap();
    assert!(snapshot.access_points.is_empty());
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(snapshot.alerts[0].severity, Severity::High);
    assert_eq!(snapshot.topology.nodes.len(), 1);
}

// ── Oneshot ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_oneshot_returns_the_cycle_snapshot() {
    let server = MockServer::start().await;
    mount_fleet(&server, healthy_aps(), healthy_switches()).await;

    let snapshot = Orchestrator::oneshot(config(&server, None)).await.unwrap();
    assert_eq!(snapshot.cycle, 1);
    assert_eq!(snapshot.data_source, DataSource::Live);
    assert_eq!(snapshot.access_points.len(), 2);
}

// ── Session recovery ────────────────────────────────────────────────

/// Requests that do not carry the session cookie.
struct WithoutSession;

impl Match for WithoutSession {
    fn matches(&self, request: &Request) -> bool {
        !request
            .headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("APSCOOKIE_1=live"))
    }
}

#[tokio::test]
async fn test_session_recovers_after_failed_startup_login() {
    let server = MockServer::start().await;
    mount_fleet(&server, healthy_aps(), healthy_switches()).await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/"))
        .and(WithoutSession)
        .respond_with(ResponseTemplate::new(401))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    // The gateway is still booting when the monitor logs in.
    Mock::given(method("POST"))
        .and(path("/logincheck"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logincheck"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "APSCOOKIE_1=live; Path=/")
                .set_body_string("1"),
        )
        .mount(&server)
        .await;

    let mut cfg = config(&server, None);
    cfg.auth = AuthCredentials::Session {
        username: "admin".into(),
        password: SecretString::from("hunter2".to_owned()),
    };
    let orchestrator = Orchestrator::new(cfg).unwrap();

    let report = orchestrator.start().await.report().cloned().unwrap();
    assert_eq!(report.data_source, DataSource::Live);
    assert!(!report.faulted);

    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/logincheck")
        .count();
    assert_eq!(logins, 2);

    assert_eq!(run(&orchestrator).await.data_source, DataSource::Live);
    orchestrator.shutdown().await;
}
