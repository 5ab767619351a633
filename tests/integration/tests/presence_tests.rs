//! Presence gateway integration tests
//!
//! Each test runs its own gateway in-process over in-memory stores, so no
//! external services are required.
//!
//! Run with: cargo test -p integration-tests --test presence_tests

use std::collections::HashSet;

use integration_tests::{
    short_window_config, unique_tenant, user, TestServer, EVENT_TIMEOUT, QUIET_PERIOD,
};
use presence_core::{run_with_tenant, DeviceInfo, PresenceStatus};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite;

// ============================================================================
// Health and upgrade
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["redis"], true);
}

#[tokio::test]
async fn test_upgrade_requires_token() {
    let server = TestServer::start().await.unwrap();
    let url = format!("ws://{}/presence", server.addr);
    match tokio_tungstenite::connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected 401, got {:?}", other.map(|_| ())),
    }

    let url = format!("ws://{}/presence?token=not-a-jwt", server.addr);
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}

#[tokio::test]
async fn test_events_before_authentication_are_rejected() {
    let server = TestServer::start().await.unwrap();
    let tenant = unique_tenant();
    let mut alice = server.connect(&tenant, &user("alice")).await.unwrap();

    let ack = alice.request("heartbeat", json!({})).await.unwrap();
    assert_eq!(ack["success"], false);
    assert_eq!(ack["error"]["code"], "NOT_AUTHENTICATED");

    let ack = alice
        .request("get_presence", json!({ "userIds": ["alice"] }))
        .await
        .unwrap();
    assert_eq!(ack["error"]["code"], "NOT_AUTHENTICATED");

    let ack = alice.request("authenticate_presence", json!({})).await.unwrap();
    assert_eq!(ack["success"], true);
    let ack = alice.request("heartbeat", json!({})).await.unwrap();
    assert_eq!(ack["success"], true);
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_online_is_broadcast_once() {
    let server = TestServer::start().await.unwrap();
    let tenant = unique_tenant();
    server.link(&tenant, &user("alice"), &user("bob")).await.unwrap();

    let mut bob = server.connect_online(&tenant, &user("bob")).await.unwrap();
    let mut alice = server.connect_online(&tenant, &user("alice")).await.unwrap();

    let update = bob
        .next_event("presence_update", EVENT_TIMEOUT)
        .await
        .unwrap()
        .expect("bob hears alice come online");
    assert_eq!(update["userId"], "alice");
    assert_eq!(update["status"], "online");

    for _ in 0..3 {
        let ack = alice.request("heartbeat", json!({})).await.unwrap();
        assert_eq!(ack["success"], true);
    }
    let extra = bob.collect_events("presence_update", QUIET_PERIOD).await.unwrap();
    assert!(extra.is_empty(), "repeat heartbeats must stay silent: {extra:?}");
}

#[tokio::test]
async fn test_silence_past_window_goes_offline_once() {
    let server = TestServer::start_with_config(short_window_config()).await.unwrap();
    let tenant = unique_tenant();
    server.link(&tenant, &user("alice"), &user("bob")).await.unwrap();

    let mut bob = server.connect_online(&tenant, &user("bob")).await.unwrap();
    let _alice = server.connect_online(&tenant, &user("alice")).await.unwrap();
    bob.next_event("presence_update", EVENT_TIMEOUT).await.unwrap();

    // Bob keeps heartbeating while alice goes quiet
    for _ in 0..6 {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        bob.request("heartbeat", json!({})).await.unwrap();
    }

    let updates = bob.collect_events("presence_update", QUIET_PERIOD).await.unwrap();
    let offline: Vec<_> = updates
        .iter()
        .filter(|u| u["userId"] == "alice" && u["status"] == "offline")
        .collect();
    assert_eq!(offline.len(), 1, "{updates:?}");
}

#[tokio::test]
async fn test_last_connection_close_goes_offline() {
    let server = TestServer::start().await.unwrap();
    let tenant = unique_tenant();
    server.link(&tenant, &user("alice"), &user("bob")).await.unwrap();

    let mut bob = server.connect_online(&tenant, &user("bob")).await.unwrap();
    let phone = server.connect_online(&tenant, &user("alice")).await.unwrap();
    let laptop = server.connect_online(&tenant, &user("alice")).await.unwrap();

    let updates = bob.collect_events("presence_update", QUIET_PERIOD).await.unwrap();
    assert_eq!(updates.len(), 1, "second connection is not a new online: {updates:?}");

    phone.close().await.unwrap();
    let updates = bob.collect_events("presence_update", QUIET_PERIOD).await.unwrap();
    assert!(updates.is_empty(), "alice is still connected: {updates:?}");

    laptop.close().await.unwrap();
    let update = bob
        .next_event("presence_update", EVENT_TIMEOUT)
        .await
        .unwrap()
        .expect("offline after last connection closes");
    assert_eq!(update["userId"], "alice");
    assert_eq!(update["status"], "offline");
}

#[tokio::test]
async fn test_monitor_receives_taxonomy_events() {
    let server = TestServer::start().await.unwrap();
    let tenant = unique_tenant();

    let mut monitor = server.connect(&tenant, &user("dashboard")).await.unwrap();
    monitor
        .request("authenticate_presence", json!({ "monitor": true }))
        .await
        .unwrap();
    // The monitor's own online event
    monitor.next_event("user_online", EVENT_TIMEOUT).await.unwrap();

    let mut alice = server.connect_online(&tenant, &user("alice")).await.unwrap();
    let online = monitor
        .next_event("user_online", EVENT_TIMEOUT)
        .await
        .unwrap()
        .expect("user_online");
    assert_eq!(online["userId"], "alice");

    alice
        .request("change_status", json!({ "status": "busy" }))
        .await
        .unwrap();
    let changed = monitor
        .next_event("status_changed", EVENT_TIMEOUT)
        .await
        .unwrap()
        .expect("status_changed");
    assert_eq!(changed["status"], "busy");
    assert_eq!(changed["previousStatus"], "online");

    alice.close().await.unwrap();
    let offline = monitor
        .next_event("user_offline", EVENT_TIMEOUT)
        .await
        .unwrap()
        .expect("user_offline");
    assert_eq!(offline["userId"], "alice");
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_get_presence_returns_known_subset() {
    let server = TestServer::start().await.unwrap();
    let tenant = unique_tenant();
    let mut alice = server.connect_online(&tenant, &user("alice")).await.unwrap();
    let _bob = server.connect_online(&tenant, &user("bob")).await.unwrap();

    let ack = alice
        .request("get_presence", json!({ "userIds": ["alice", "bob", "carol"] }))
        .await
        .unwrap();
    let presence = ack["presence"].as_object().unwrap();
    assert_eq!(presence.len(), 2);
    assert!(presence.contains_key("bob"));
    assert!(!presence.contains_key("carol"));

    let too_many: Vec<String> = (0..101).map(|i| format!("user{i}")).collect();
    let ack = alice
        .request("get_presence", json!({ "userIds": too_many }))
        .await
        .unwrap();
    assert_eq!(ack["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_online_users_paginate_without_duplicates() {
    let server = TestServer::start().await.unwrap();
    let tenant = unique_tenant();
    let supervisor = server.state.services().supervisor();

    let expected: HashSet<String> = (0..7).map(|i| format!("member{i}")).collect();
    run_with_tenant(tenant.clone(), async {
        for id in &expected {
            supervisor
                .process_heartbeat(&user(id), PresenceStatus::Online, DeviceInfo::default())
                .await
                .unwrap();
        }
        supervisor
            .process_heartbeat(&user("ghost"), PresenceStatus::Online, DeviceInfo::default())
            .await
            .unwrap();
        supervisor.set_offline(&user("ghost")).await.unwrap();
    })
    .await;

    let mut reader = server.connect_online(&unique_tenant(), &user("reader")).await.unwrap();
    let ack = reader
        .request("get_online_users", json!({ "limit": 100 }))
        .await
        .unwrap();
    assert_eq!(ack["users"].as_array().unwrap().len(), 1, "other tenants stay hidden");

    let mut reader = server.connect_online(&tenant, &user("reader")).await.unwrap();
    let mut seen = Vec::new();
    let mut cursor = "0".to_string();
    for _ in 0..50 {
        let ack = reader
            .request("get_online_users", json!({ "limit": 3, "cursor": cursor }))
            .await
            .unwrap();
        assert_eq!(ack["success"], true);
        for record in ack["users"].as_array().unwrap() {
            seen.push(record["userId"].as_str().unwrap().to_string());
        }
        cursor = ack["nextCursor"].as_str().unwrap().to_string();
        if cursor == "0" {
            break;
        }
    }
    assert_eq!(cursor, "0");

    let unique: HashSet<String> = seen.iter().cloned().collect();
    assert_eq!(unique.len(), seen.len(), "duplicates in {seen:?}");
    let mut want = expected;
    want.insert("reader".to_string());
    assert_eq!(unique, want);
}

// ============================================================================
// Tenant isolation
// ============================================================================

#[tokio::test]
async fn test_tenants_do_not_see_each_other() {
    let server = TestServer::start().await.unwrap();
    let acme = unique_tenant();
    let globex = unique_tenant();
    server.link(&acme, &user("alice"), &user("bob")).await.unwrap();
    server.link(&globex, &user("alice"), &user("bob")).await.unwrap();

    let mut globex_bob = server.connect_online(&globex, &user("bob")).await.unwrap();
    let _acme_alice = server.connect_online(&acme, &user("alice")).await.unwrap();

    let leaked = globex_bob
        .collect_events("presence_update", QUIET_PERIOD)
        .await
        .unwrap();
    assert!(leaked.is_empty(), "acme presence reached globex: {leaked:?}");

    let ack = globex_bob
        .request("get_presence", json!({ "userIds": ["alice"] }))
        .await
        .unwrap();
    assert!(ack["presence"].as_object().unwrap().is_empty());
}
