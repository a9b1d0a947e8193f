//! HTTP surface integration tests against a real Postgres container and a
//! filesystem-backed artifact store.
//!
//! Run with: `cargo test -p kiln-tests --test api_tests --features integration`

#![cfg(feature = "integration")]

use kiln_core::ids::PipelineId;
use kiln_core::ports::PipelineStore;
use kiln_db::PgPipelineStore;
use kiln_tests::context::TestContext;
use kiln_tests::helpers::{start_test_server, ApiTestClient};
use reqwest::StatusCode;

async fn server(ctx: &TestContext) -> (ApiTestClient, tokio::task::JoinHandle<()>) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (addr, handle) = start_test_server(ctx.db.clone(), tmp.path().to_path_buf())
        .await
        .expect("failed to start server");
    std::mem::forget(tmp);
    (ApiTestClient::new(addr, "alice"), handle)
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = TestContext::new().await.expect("failed to create test context");
    let (client, _handle) = server(&ctx).await;

    assert!(client.health().await.expect("health check failed"));
}

#[tokio::test]
async fn test_list_pipelines_empty() {
    let ctx = TestContext::new().await.expect("failed to create test context");
    let (client, _handle) = server(&ctx).await;

    let resp = client.get("/pipelines/").await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = resp.json().await.expect("failed to parse JSON");
    assert!(body["pipeline_ids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_pipelines_returns_only_caller_rows() {
    let ctx = TestContext::new().await.expect("failed to create test context");
    let store = PgPipelineStore::new(ctx.db.pool().clone());

    let mine = PipelineId::new();
    store.insert_pipeline(mine, "alice").await.unwrap();
    let other = PipelineId::new();
    store.insert_pipeline(other, "mallory").await.unwrap();

    let (client, _handle) = server(&ctx).await;

    let resp = client.get("/pipelines/").await.expect("request failed");
    let body: serde_json::Value = resp.json().await.expect("failed to parse JSON");
    let ids: Vec<String> = body["pipeline_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    assert_eq!(ids, vec![mine.to_string()]);
}

#[tokio::test]
async fn test_get_pipeline_stages_unknown_pipeline_returns_empty() {
    let ctx = TestContext::new().await.expect("failed to create test context");
    let (client, _handle) = server(&ctx).await;

    let resp = client
        .get(&format!("/pipelines/{}", PipelineId::new()))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Vec<serde_json::Value> = resp.json().await.expect("failed to parse JSON");
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_execute_fourth_request_in_window_is_rate_limited() {
    let ctx = TestContext::new().await.expect("failed to create test context");
    let (client, _handle) = server(&ctx).await;

    let pipeline = serde_json::json!({
        "image": "alpine",
        "stages": {
            "build": { "script": ["echo hi"], "depends_on": [], "artifacts": [] }
        }
    });

    for attempt in 0..3 {
        let resp = client
            .post("/execute", &pipeline)
            .await
            .expect("request failed");
        assert_eq!(
            resp.status(),
            StatusCode::ACCEPTED,
            "attempt {attempt} should be within the rate limit window"
        );
    }

    let resp = client
        .post("/execute", &pipeline)
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_execute_rejects_missing_client_id() {
    let ctx = TestContext::new().await.expect("failed to create test context");
    let tmp = tempfile::tempdir().unwrap();
    let (addr, _handle) = start_test_server(ctx.db.clone(), tmp.path().to_path_buf())
        .await
        .unwrap();

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/execute"))
        .json(&serde_json::json!({"image": "alpine", "stages": {}}))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
