#![allow(clippy::unwrap_used)]
// Reconciler over a wiremock-backed `RemoteSource`.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campus_core::{
    AttackCategory, BackendConfig, Connectivity, CoreError, DataSource, Family,
    MitigationControl, Reconciler, ReconcilerConfig, RemoteSource, Severity,
};

// ── Helpers ──────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RemoteSource) {
    let server = MockServer::start().await;
    let mut config = BackendConfig::new(&format!("{}/api", server.uri()), &server.uri()).unwrap();
    config.timeout = Duration::from_secs(2);
    (server, RemoteSource::new(config).unwrap())
}

async fn mount_get(server: &MockServer, route: &str, data: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": data,
        })))
        .mount(server)
        .await;
}

async fn mount_backend(server: &MockServer) {
    mount_get(
        server,
        "/api/security/attacks",
        json!([
            {"type": "info", "category": "Port Scan", "message": "older",
             "time": "2026-10-19T08:00:00Z", "severity": "MEDIUM", "source": "10.0.0.7"},
            {"type": "critical", "category": "DoS Attack", "message": "newer",
             "time": "2026-10-19T08:05:00Z", "severity": "CRITICAL", "source": "Network Monitor"}
        ]),
    )
    .await;
    mount_get(
        server,
        "/api/security/stats",
        json!({"dos": 1, "sql_injection": 0, "brute_force": 0,
               "arp_spoofing": 0, "port_scan": 1, "mitm": 0}),
    )
    .await;
    mount_get(
        server,
        "/api/system/stats",
        json!({"cpu": 12.5, "memory": 48.0, "disk": 61.0, "temperature": 52.0,
               "network": {"bytes_sent": 10, "bytes_recv": 20,
                           "packets_sent": 300, "packets_recv": 2000},
               "connections": 14}),
    )
    .await;
    mount_get(
        server,
        "/api/sensors",
        json!({"building_a": {"light": {"value": 71.0, "unit": "%", "active": true}}}),
    )
    .await;
}

fn live_config() -> ReconcilerConfig {
    ReconcilerConfig {
        poll_interval: None,
        push_enabled: false,
        ..ReconcilerConfig::default()
    }
}

// ── Fetch ────────────────────────────────────────────────────────────

#[tokio::test]
async fn initial_load_populates_every_family() {
    let (server, source) = setup().await;
    mount_backend(&server).await;

    let reconciler = Reconciler::new(live_config(), source);
    reconciler.start().await.unwrap();
    let vm = reconciler.snapshot();

    assert_eq!(vm.alerts.len(), 2);
    assert_eq!(vm.alerts[0].message, "newer");
    assert_eq!(vm.alerts[0].severity, Severity::Critical);
    assert_eq!(vm.counters.get(AttackCategory::PortScan), 1);
    assert_eq!(vm.counters.total(), 2);

    let health = vm.health.snapshot().unwrap();
    assert!((health.network_percent - 80.0).abs() < f64::EPSILON);
    assert_eq!(health.connection_count, 14);

    let building = &vm.sectors["buildingA"];
    assert_eq!(building.connectivity, Connectivity::Online);
    assert!((building.sensors["light"].value - 71.0).abs() < f64::EPSILON);
    // Unreported sensors keep their layout defaults.
    assert!(building.sensors["smoke"].last_update.is_none());

    reconciler.teardown().await;
}

#[tokio::test]
async fn failed_family_keeps_last_value() {
    let (server, source) = setup().await;
    mount_get(
        &server,
        "/api/security/stats",
        json!({"dos": 2, "sql_injection": 0, "brute_force": 0,
               "arp_spoofing": 0, "port_scan": 0, "mitm": 0}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/system/stats"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false, "error": "psutil unavailable"
        })))
        .mount(&server)
        .await;

    let reconciler = Reconciler::new(live_config(), source);
    reconciler.start().await.unwrap();

    assert_eq!(reconciler.read(|vm| vm.counters.total()), 2);
    assert!(reconciler.read(|vm| vm.health.is_empty()));

    let err = reconciler.refresh_family(Family::Health).await.unwrap_err();
    assert!(err.is_transient());
    reconciler.teardown().await;
}

// ── Commands ─────────────────────────────────────────────────────────

#[tokio::test]
async fn mitigation_toggle_round_trips() {
    let (server, source) = setup().await;
    mount_backend(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/mitigation/toggle"))
        .and(body_json(json!({"measure": "rateLimit", "enabled": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "message": "rateLimit enabled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = Reconciler::oneshot(live_config(), source, |r| async move {
        r.toggle_mitigation(MitigationControl::RateLimit, true).await
    })
    .await
    .unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.alert.unwrap().message, "RATELIMIT has been ENABLED");
}

#[tokio::test]
async fn rejected_block_leaves_state_alone() {
    let (server, source) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/security/block-ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "error": "ufw not available"
        })))
        .mount(&server)
        .await;

    let reconciler = Reconciler::new(live_config().oneshot(), source);
    reconciler.start().await.unwrap();

    let err = reconciler
        .block_address("203.0.113.4".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CommandRejected { ref reason } if reason == "ufw not available"));
    assert!(reconciler.read(|vm| vm.blocked_addresses.is_empty()));
    assert!(reconciler.read(|vm| vm.alerts.is_empty()));
    reconciler.teardown().await;
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    let source = RemoteSource::new(
        BackendConfig::new("http://127.0.0.1:9/api", "http://127.0.0.1:9").unwrap(),
    )
    .unwrap();
    let err = source.fetch_security_counters().await.unwrap_err();
    assert!(err.is_transient());
}
