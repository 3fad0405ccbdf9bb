// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the relay admin API and credential rejections.
//!
//! Uses `axum_test::TestServer` with an in-memory store and an exchange
//! double, so no upstream is contacted.

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use base64::Engine;
use serde_json::json;

use copilot_relay::config::RelayConfig;
use copilot_relay::credential::bearer::TokenExchange;
use copilot_relay::state::RelayState;
use copilot_relay::store::memory::MemoryStore;
use copilot_relay::store::SecretStore;
use copilot_relay::test_support::{test_state, CountingExchange};
use copilot_relay::transport::build_router;

type Harness = (TestServer, Arc<RelayState>, Arc<MemoryStore>, Arc<CountingExchange>);

fn setup(config: RelayConfig) -> Harness {
    let exchange = Arc::new(CountingExchange::new());
    let (state, store) =
        test_state(config, Arc::clone(&exchange) as Arc<dyn TokenExchange>).expect("state");
    let server =
        TestServer::new(build_router(Arc::clone(&state))).expect("failed to create test server");
    (server, state, store, exchange)
}

fn basic(password: &str) -> HeaderValue {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("admin:{password}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value")
}

#[tokio::test]
async fn health_reports_counts() -> anyhow::Result<()> {
    let (server, _state, store, _) = setup(RelayConfig::test());
    store.create_oauth_token("main".into(), "gho_main_token".into()).await?;

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["api_keys"], 0);
    assert_eq!(body["oauth_tokens"], 1);
    Ok(())
}

#[tokio::test]
async fn api_key_lifecycle() -> anyhow::Result<()> {
    let (server, _state, store, _) = setup(RelayConfig::test());
    let token = store.create_oauth_token("main".into(), "gho_main_token".into()).await?;

    let resp =
        server.post("/admin/api-keys").json(&json!({ "name": "ci", "token_id": token.id })).await;
    resp.assert_status(StatusCode::CREATED);
    let created: serde_json::Value = resp.json();
    let key = created["key"].as_str().unwrap_or_default().to_owned();
    assert!(key.starts_with("sk-"));
    assert_eq!(key.len(), 3 + 48);

    let resp = server.post("/admin/api-keys").json(&json!({ "name": "global" })).await;
    resp.assert_status(StatusCode::CREATED);

    // Newest first, masked, with the linked token's name.
    let list: Vec<serde_json::Value> = server.get("/admin/api-keys").await.json();
    assert_eq!(list.len(), 2);
    let ci = list.iter().find(|k| k["name"] == "ci").expect("ci key listed");
    assert_eq!(ci["linked_token_name"], "main");
    let masked = ci["masked_key"].as_str().unwrap_or_default();
    assert!(masked.contains("****"));
    assert!(!masked.contains(&key[4..key.len() - 4]));

    let id = created["id"].as_str().unwrap_or_default();
    server.delete(&format!("/admin/api-keys/{id}")).await.assert_status_ok();
    server.delete(&format!("/admin/api-keys/{id}")).await.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn api_key_creation_is_validated() -> anyhow::Result<()> {
    let (server, _state, _store, _) = setup(RelayConfig::test());

    let resp = server.post("/admin/api-keys").json(&json!({ "name": "  " })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let resp =
        server.post("/admin/api-keys").json(&json!({ "name": "x", "token_id": "missing" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn token_selection_lifecycle() -> anyhow::Result<()> {
    let (server, _state, store, _) = setup(RelayConfig::test());

    let resp =
        server.post("/admin/tokens").json(&json!({ "name": "a", "token": "gho_aaaa_1111" })).await;
    resp.assert_status(StatusCode::CREATED);
    let created: serde_json::Value = resp.json();
    assert_eq!(created["masked_token"], "gho_****1111");
    let id = created["id"].as_str().unwrap_or_default().to_owned();

    server.post(&format!("/admin/tokens/{id}/select")).await.assert_status_ok();
    let list: Vec<serde_json::Value> = server.get("/admin/tokens").await.json();
    assert_eq!(list[0]["selected"], true);
    assert_eq!(store.find_selected_oauth_token().await?.map(|t| t.id), Some(id.clone()));

    server.delete("/admin/tokens/selected").await.assert_status_ok();
    assert_eq!(store.find_selected_oauth_token().await?, None);

    server.post("/admin/tokens/nope/select").await.assert_status(StatusCode::NOT_FOUND);
    server.delete(&format!("/admin/tokens/{id}")).await.assert_status_ok();
    server.delete(&format!("/admin/tokens/{id}")).await.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn refresh_reports_quota_and_lists_snapshot() -> anyhow::Result<()> {
    let (server, _state, store, exchange) = setup(RelayConfig::test());
    let token = store.create_oauth_token("main".into(), "gho_main_token".into()).await?;

    let resp = server.post(&format!("/admin/tokens/{}/refresh", token.id)).await;
    resp.assert_status_ok();
    let quota: serde_json::Value = resp.json();
    assert!(quota["expires_at"].as_u64().is_some());
    assert!(quota["chat_quota"].is_null());
    assert!(quota.get("bearer").is_none());
    assert_eq!(exchange.calls(), 1);

    let list: Vec<serde_json::Value> = server.get("/admin/tokens").await.json();
    assert!(list[0]["quota"]["refreshed_at"].as_u64().is_some());

    server.post("/admin/tokens/missing/refresh").await.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admin_gate_requires_basic_auth() -> anyhow::Result<()> {
    let config = RelayConfig { admin_password: Some("hunter2".into()), ..RelayConfig::test() };
    let (server, _state, _store, _) = setup(config);

    let resp = server.get("/admin/api-keys").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
        Some("Basic realm=\"Copilot Relay Admin\"")
    );

    server
        .get("/admin/api-keys")
        .add_header(header::AUTHORIZATION, basic("wrong"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/admin/api-keys")
        .add_header(header::AUTHORIZATION, basic("hunter2"))
        .await
        .assert_status_ok();

    // Health stays open.
    server.get("/health").await.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn api_paths_bypass_admin_gate_but_not_pipeline() -> anyhow::Result<()> {
    let config = RelayConfig { admin_password: Some("hunter2".into()), ..RelayConfig::test() };
    let (server, _state, store, exchange) = setup(config);
    store.create_api_key("app".into(), None).await?;

    // Basic auth is not an API key: the pipeline rejects it without a challenge.
    let resp = server
        .post("/api/chat/completions")
        .add_header(header::AUTHORIZATION, basic("hunter2"))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Invalid API key");
    assert_eq!(exchange.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn api_rejections() -> anyhow::Result<()> {
    let cases: [(Option<&'static str>, bool, &str); 5] = [
        (None, true, "API key required"),
        (Some("Bearer _"), true, "Invalid API key"),
        (Some("Bearer _"), false, "Invalid API key"),
        (Some("Bearer sk-unknown"), true, "Invalid API key"),
        (None, false, "No tokens configured"),
    ];
    for (auth, with_key, message) in cases {
        let (server, _state, store, exchange) = setup(RelayConfig::test());
        if with_key {
            store.create_api_key("app".into(), None).await?;
        }

        let mut req = server.post("/api/chat/completions").json(&json!({ "model": "gpt-4o" }));
        if let Some(value) = auth {
            req = req.add_header(header::AUTHORIZATION, HeaderValue::from_static(value));
        }
        let resp = req.await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = resp.json();
        assert_eq!(body["error"]["message"], message, "{auth:?}");
        assert_eq!(exchange.calls(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let (server, _state, _store, _) = setup(RelayConfig::test());
    server.get("/nowhere").await.assert_status(StatusCode::NOT_FOUND);
    server.get("/apix/models").await.assert_status(StatusCode::NOT_FOUND);
}
