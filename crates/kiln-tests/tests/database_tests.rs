//! Persistence adapter integration tests against a real Postgres container.
//!
//! Run with: `cargo test -p kiln-tests --test database_tests --features integration`

#![cfg(feature = "integration")]

use kiln_core::ids::PipelineId;
use kiln_core::ports::PipelineStore;
use kiln_core::state::{StageRunRecord, StageStatus};
use kiln_db::PgPipelineStore;
use kiln_tests::context::TestContext;

#[tokio::test]
async fn test_insert_and_list_pipelines() {
    let ctx = TestContext::new().await.expect("failed to create context");
    let store = PgPipelineStore::new(ctx.db.pool().clone());

    let id = PipelineId::new();
    store.insert_pipeline(id, "alice").await.expect("insert pipeline");

    let pipelines = store.list_pipelines("alice").await.expect("list pipelines");
    assert_eq!(pipelines, vec![id]);

    let others = store.list_pipelines("bob").await.expect("list pipelines");
    assert!(others.is_empty());
}

#[tokio::test]
async fn test_stage_lifecycle() {
    let ctx = TestContext::new().await.expect("failed to create context");
    let store = PgPipelineStore::new(ctx.db.pool().clone());

    let id = PipelineId::new();
    store.insert_pipeline(id, "alice").await.unwrap();
    store.insert_stage_running(id, "build").await.unwrap();

    let running = store.get_stages(id, "alice").await.unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].status, StageStatus::Running);

    let record = StageRunRecord {
        pipeline_id: id,
        name: "build".to_string(),
        status: StageStatus::Success,
        message: "hi\n".to_string(),
        artifact_urls: vec!["big-data-ci/id/build/artifacts/out.txt".to_string()],
    };
    store.finish_stage(id, "build", &record).await.unwrap();

    let finished = store.get_stages(id, "alice").await.unwrap();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].status, StageStatus::Success);
    assert_eq!(finished[0].message, "hi\n");
    assert_eq!(finished[0].artifact_urls.len(), 1);
}

#[tokio::test]
async fn test_get_stages_respects_ownership() {
    let ctx = TestContext::new().await.expect("failed to create context");
    let store = PgPipelineStore::new(ctx.db.pool().clone());

    let id = PipelineId::new();
    store.insert_pipeline(id, "alice").await.unwrap();
    store.insert_stage_running(id, "build").await.unwrap();

    let as_owner = store.get_stages(id, "alice").await.unwrap();
    assert_eq!(as_owner.len(), 1);

    let as_stranger = store.get_stages(id, "mallory").await.unwrap();
    assert!(as_stranger.is_empty());
}

#[tokio::test]
async fn test_concurrent_stage_inserts_target_disjoint_rows() {
    let ctx = TestContext::new().await.expect("failed to create context");
    let id = PipelineId::new();

    let store = PgPipelineStore::new(ctx.db.pool().clone());
    store.insert_pipeline(id, "alice").await.unwrap();

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let store = PgPipelineStore::new(ctx.db.pool().clone());
            tokio::spawn(async move {
                store.insert_stage_running(id, &format!("stage-{i}")).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().expect("concurrent insert failed");
    }

    let stages = store.get_stages(id, "alice").await.unwrap();
    assert_eq!(stages.len(), 5);
}
