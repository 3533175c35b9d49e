//! Integration tests for the deskpulse HTTP API

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use deskpulse::config::Config;
use deskpulse::server::run;
use deskpulse::store::MemoryStore;
use deskpulse::telemetry::{DeskTelemetry, TelemetryCache};

struct TestAgent {
    addr: SocketAddr,
    cache: Arc<TelemetryCache>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    client: reqwest::Client,
}

impl TestAgent {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Spawn an agent on a random port with an accelerated reporting clock and
/// a pre-warmed telemetry cache.
async fn start_agent() -> TestAgent {
    let config = Config {
        port: 0,
        admin_token: "test-admin-token".to_string(),
        // Demo scale: one elapsed second reports as a quarter minute.
        seconds_to_reported_minutes: 0.25,
        ..Config::default()
    };

    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(TelemetryCache::new(Duration::from_secs(60)));
    cache.insert("desk-1", DeskTelemetry::new(700, 0));
    cache.insert("desk-2", DeskTelemetry::new(1100, 0));

    let (addr, shutdown_tx) = run(config, store, cache.clone())
        .await
        .expect("Failed to start server");

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestAgent {
        addr,
        cache,
        shutdown_tx,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let agent = start_agent().await;

    let response = agent
        .client
        .get(agent.url("/health"))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_pairing_exclusivity_over_the_wire() {
    let agent = start_agent().await;

    // Alice claims desk-1.
    let body: serde_json::Value = agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"user_id": "alice", "desk_id": "desk-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert!(body["session_id"].as_str().is_some());

    // Bob is refused with a structured business outcome, not an error.
    let response = agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"user_id": "bob", "desk_id": "desk-1"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "occupied_by:alice");

    // Alice leaves; now bob can claim it.
    let body: serde_json::Value = agent
        .client
        .post(agent.url("/api/unpair"))
        .json(&serde_json::json!({"user_id": "alice"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    let body: serde_json::Value = agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"user_id": "bob", "desk_id": "desk-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_pair_requires_identity() {
    let agent = start_agent().await;

    let response = agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"desk_id": "desk-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "not_authenticated");

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_booking_overlap_rules() {
    let agent = start_agent().await;
    let book = |start: &str, end: &str| {
        let client = agent.client.clone();
        let url = agent.url("/api/book");
        let body = serde_json::json!({
            "user_id": "alice",
            "desk_id": "desk-2",
            "start_time": start,
            "end_time": end,
        });
        async move {
            let response = client.post(url).json(&body).send().await.unwrap();
            let status = response.status();
            let body: serde_json::Value = response.json().await.unwrap();
            (status, body)
        }
    };

    let (status, body) = book("2099-01-01T10:00:00Z", "2099-01-01T11:00:00Z").await;
    assert!(status.is_success());
    assert_eq!(body["success"], true);

    // Overlapping window is refused.
    let (status, body) = book("2099-01-01T10:30:00Z", "2099-01-01T11:30:00Z").await;
    assert!(status.is_success());
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "booking_overlap");

    // Touching boundary is not overlap.
    let (_, body) = book("2099-01-01T11:00:00Z", "2099-01-01T12:00:00Z").await;
    assert_eq!(body["success"], true);

    // Reversed window: validation, rejected before any mutation.
    let (status, body) = book("2099-01-01T15:00:00Z", "2099-01-01T14:00:00Z").await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Unparseable timestamps: validation.
    let (status, body) = book("next tuesday", "2099-01-01T16:00:00Z").await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "validation");

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_admin_force_unpair_requires_token() {
    let agent = start_agent().await;

    agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"user_id": "alice", "desk_id": "desk-1"}))
        .send()
        .await
        .unwrap();

    // No token: rejected.
    let response = agent
        .client
        .post(agent.url("/api/admin/force-unpair"))
        .json(&serde_json::json!({"desk_id": "desk-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    // Wrong token: rejected.
    let response = agent
        .client
        .post(agent.url("/api/admin/force-unpair"))
        .header("Authorization", "Bearer nope")
        .json(&serde_json::json!({"desk_id": "desk-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    // Correct token evicts the pairing.
    let body: serde_json::Value = agent
        .client
        .post(agent.url("/api/admin/force-unpair"))
        .header("Authorization", "Bearer test-admin-token")
        .json(&serde_json::json!({"desk_id": "desk-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    // A second eviction finds nothing.
    let body: serde_json::Value = agent
        .client
        .post(agent.url("/api/admin/force-unpair"))
        .header("Authorization", "Bearer test-admin-token")
        .json(&serde_json::json!({"desk_id": "desk-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "desk_not_paired");

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_metrics_without_sessions_is_zeroed_success() {
    let agent = start_agent().await;

    let body: serde_json::Value = agent
        .client
        .get(agent.url("/api/metrics/nobody"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["total_minutes"], 0.0);
    assert_eq!(body["sitting_pct"], 0);
    assert_eq!(body["standing_pct"], 0);
    assert_eq!(body["health_score"], 0);
    assert!(body["last_transition_minutes_ago"].is_null());

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_metrics_accrue_from_paired_desk() {
    let agent = start_agent().await;

    let body: serde_json::Value = agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"user_id": "alice", "desk_id": "desk-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    // First poll seeds the sample log.
    let body: serde_json::Value = agent
        .client
        .get(agent.url("/api/metrics/alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    // After a tick the session has measurable sitting time at 700mm.
    tokio::time::sleep(Duration::from_millis(1300)).await;
    let body: serde_json::Value = agent
        .client
        .get(agent.url("/api/metrics/alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert!(body["total_minutes"].as_f64().unwrap() > 0.0);
    assert_eq!(body["sitting_pct"], 100);
    assert_eq!(body["standing_pct"], 0);
    assert_eq!(body["transitions"], 0);
    // All-sitting, no transitions: balance 60, activity 0.
    assert_eq!(body["health_score"], 36);

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_desk_status_reports_live_telemetry() {
    let agent = start_agent().await;

    agent
        .client
        .post(agent.url("/api/pair"))
        .json(&serde_json::json!({"user_id": "alice", "desk_id": "desk-2"}))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = agent
        .client
        .get(agent.url("/api/desks/desk-2/status?user_id=alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["is_paired"], true);
    assert_eq!(body["current_height_cm"], 110);
    assert_eq!(body["is_moving"], false);

    // Someone else asking about the same desk is not paired with it.
    let body: serde_json::Value = agent
        .client
        .get(agent.url("/api/desks/desk-2/status?user_id=bob"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["is_paired"], false);
    assert!(body["current_height_cm"].is_null());

    // Telemetry loss degrades to nulls, never an error.
    agent.cache.invalidate("desk-2");
    let response = agent
        .client
        .get(agent.url("/api/desks/desk-2/status?user_id=alice"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["is_paired"], true);
    assert!(body["current_height_cm"].is_null());

    let _ = agent.shutdown_tx.send(());
}

#[tokio::test]
async fn test_recommendations_endpoint() {
    let agent = start_agent().await;

    let body: serde_json::Value = agent
        .client
        .get(agent.url("/api/recommendations?height_cm=176"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["sit_cm"], 71);
    assert_eq!(body["stand_cm"], 111);

    let response = agent
        .client
        .get(agent.url("/api/recommendations?height_cm=20"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = agent.shutdown_tx.send(());
}
