//! Main scheduler orchestration: the component that accepts one pipeline,
//! drives its layered execution, and reports `OK`/`ABORT`/`BAD_PIPELINE`.

use crate::dag::{DagBuilder, DagError, PipelineDag};

use kiln_core::error::BadPipelineReason;
use kiln_core::ids::PipelineId;
use kiln_core::pipeline::PipelineDescriptor;
use kiln_core::ports::{ArtifactStore, ContainerRuntime, PipelineStore};
use kiln_core::state::{PipelineInstance, StageOutput, StageRunRecord, StageState, StageStatus};
use kiln_core::{Error, Result};
use kiln_runner::run_stage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{info, instrument, warn};

/// Outcome of one `schedule()` call, matching the taxonomy the HTTP boundary
/// maps into status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Abort,
    UnknownStage,
    BadPipeline,
}

/// Default bound on concurrently running stages, overridable via
/// configuration.
pub const DEFAULT_MAX_CONTAINERS: usize = 20;

/// The main scheduler service. Construction is cheap; one `Scheduler` is
/// shared across every accepted pipeline.
pub struct Scheduler {
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn PipelineStore>,
    artifacts: Arc<dyn ArtifactStore>,
    max_containers: usize,
}

impl Scheduler {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn PipelineStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self::with_max_containers(runtime, store, artifacts, DEFAULT_MAX_CONTAINERS)
    }

    pub fn with_max_containers(
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn PipelineStore>,
        artifacts: Arc<dyn ArtifactStore>,
        max_containers: usize,
    ) -> Self {
        Self {
            runtime,
            store,
            artifacts,
            max_containers,
        }
    }

    /// Executes a whole pipeline synchronously from the caller's
    /// perspective. Callers that want a fire-and-forget HTTP response spawn
    /// this in its own task.
    #[instrument(skip(self, descriptor), fields(client_id))]
    pub async fn schedule(&self, descriptor: PipelineDescriptor, client_id: &str) -> Result<Outcome> {
        if let Err(reason) = descriptor.validate() {
            return Ok(bad_pipeline_outcome(reason));
        }

        let dag = match DagBuilder::build(&descriptor) {
            Ok(dag) => dag,
            Err(DagError::CycleDetected) => {
                return Ok(bad_pipeline_outcome(BadPipelineReason::Cycle))
            }
            Err(DagError::EmptyPipeline) => {
                return Ok(bad_pipeline_outcome(BadPipelineReason::EmptyPipeline))
            }
        };

        let layers = dag.layers();
        let initial_ready: Vec<String> = match layers.first() {
            Some(layer) if !layer.is_empty() => layer.clone(),
            _ if descriptor.stages.len() == 1 => descriptor.stages.keys().cloned().collect(),
            _ => return Ok(bad_pipeline_outcome(BadPipelineReason::EmptyPipeline)),
        };
        if initial_ready.iter().any(|s| !dag.has_metadata(s)) {
            return Ok(Outcome::UnknownStage);
        }

        // Only now do we commit to this pipeline's identity and persist it:
        // every BAD_PIPELINE/UNKNOWN_STAGE path above leaves no row in
        // `pipelines` or `stages`.
        let mut instance = PipelineInstance::new(descriptor, client_id.to_string());
        let pipeline_id = instance.id;
        self.store.insert_pipeline(pipeline_id, client_id).await?;

        info!(pipeline_id = %pipeline_id, stages = instance.descriptor.stages.len(), "pipeline accepted");

        let pipeline = Arc::new(instance.descriptor.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_containers));
        let (done_tx, mut done_rx) = mpsc::channel::<StageOutput>(self.max_containers);
        let mut stage_to_container_id: HashMap<String, String> = HashMap::new();
        let mut permits: HashMap<String, OwnedSemaphorePermit> = HashMap::new();

        for stage_name in &initial_ready {
            self.launch_stage(
                pipeline_id,
                &pipeline,
                stage_name,
                &stage_to_container_id,
                &mut instance,
                &semaphore,
                &mut permits,
                done_tx.clone(),
            )
            .await?;
        }

        let outcome = loop {
            if permits.is_empty() {
                break Outcome::Ok;
            }
            let Some(output) = done_rx.recv().await else {
                break Outcome::Ok;
            };
            permits.remove(&output.name);

            if let Some(container_id) = &output.container_id {
                stage_to_container_id.insert(output.name.clone(), container_id.clone());
            }

            if !output.succeeded() {
                let record = StageRunRecord {
                    pipeline_id,
                    name: output.name.clone(),
                    status: StageStatus::Failed,
                    message: output.message.clone(),
                    artifact_urls: vec![],
                };
                self.store.finish_stage(pipeline_id, &output.name, &record).await?;
                warn!(pipeline_id = %pipeline_id, stage = %output.name, "stage failed, aborting pipeline");
                break Outcome::Abort;
            }

            instance
                .stage_state
                .insert(output.name.clone(), StageState::Finished);
            let record = StageRunRecord {
                pipeline_id,
                name: output.name.clone(),
                status: StageStatus::Success,
                message: output.message.clone(),
                artifact_urls: output.artifact_urls.clone(),
            };
            self.store.finish_stage(pipeline_id, &output.name, &record).await?;

            let next_ready = self.compute_next_ready(&dag, &instance);
            if let Some(ghost) = next_ready.iter().find(|s| !dag.has_metadata(s)) {
                warn!(pipeline_id = %pipeline_id, stage = %ghost, "ready stage has no metadata, aborting pipeline");
                break Outcome::UnknownStage;
            }
            for stage_name in &next_ready {
                self.launch_stage(
                    pipeline_id,
                    &pipeline,
                    stage_name,
                    &stage_to_container_id,
                    &mut instance,
                    &semaphore,
                    &mut permits,
                    done_tx.clone(),
                )
                .await?;
            }

            if instance.all_finished() {
                for container_id in stage_to_container_id.values() {
                    if let Err(e) = self.runtime.remove_container(container_id).await {
                        warn!(pipeline_id = %pipeline_id, container_id, error = %e, "container cleanup failed");
                    }
                }
                break Outcome::Ok;
            }
        };

        Ok(outcome)
    }

    /// Stages `s` with `state[s] == NotRunning` whose every declared
    /// dependency has `state[d] == Finished`.
    fn compute_next_ready(&self, dag: &PipelineDag, instance: &PipelineInstance) -> Vec<String> {
        instance
            .stage_state
            .iter()
            .filter(|(_, state)| matches!(state, StageState::NotRunning))
            .filter(|(name, _)| {
                dag.dependencies_of(name).iter().all(|dep| {
                    instance
                        .stage_state
                        .get(*dep)
                        .is_some_and(|s| matches!(s, StageState::Finished))
                })
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Acquires a concurrency permit, marks `stage_name` `Running`, persists
    /// the `RUNNING` row, and spawns its stage runner task. The permit is
    /// held in `permits` until the scheduler loop receives this stage's
    /// completion, not released by the task itself.
    #[allow(clippy::too_many_arguments)]
    async fn launch_stage(
        &self,
        pipeline_id: PipelineId,
        pipeline: &Arc<PipelineDescriptor>,
        stage_name: &str,
        stage_to_container_id: &HashMap<String, String>,
        instance: &mut PipelineInstance,
        semaphore: &Arc<Semaphore>,
        permits: &mut HashMap<String, OwnedSemaphorePermit>,
        done_tx: mpsc::Sender<StageOutput>,
    ) -> Result<()> {
        let permit = Arc::clone(semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Infra(format!("concurrency semaphore closed: {e}")))?;
        permits.insert(stage_name.to_string(), permit);

        instance
            .stage_state
            .insert(stage_name.to_string(), StageState::Running);
        self.store.insert_stage_running(pipeline_id, stage_name).await?;

        let producer_container_ids = stage_to_container_id.clone();
        let runtime = Arc::clone(&self.runtime);
        let artifacts = Arc::clone(&self.artifacts);
        let pipeline = Arc::clone(pipeline);
        let stage_name = stage_name.to_string();

        tokio::spawn(async move {
            run_stage(
                pipeline_id,
                pipeline,
                stage_name,
                producer_container_ids,
                runtime,
                artifacts,
                done_tx,
            )
            .await;
        });

        Ok(())
    }
}

fn bad_pipeline_outcome(reason: BadPipelineReason) -> Outcome {
    let err: Error = reason.into();
    warn!(%err, "pipeline rejected");
    Outcome::BadPipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_core::pipeline::{DependencyRef, StageMetadata};
    use kiln_core::Result as CoreResult;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeRuntime {
        fail_stage: Option<String>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn pull_image(&self, _reference: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn create_container(
            &self,
            name: &str,
            _image_reference: &str,
            _command: &str,
        ) -> CoreResult<String> {
            Ok(format!("container-{name}"))
        }

        async fn start_container(&self, _container_id: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn wait_container(&self, container_id: &str) -> CoreResult<i64> {
            if let Some(fail) = &self.fail_stage {
                if container_id.contains(fail.as_str()) {
                    return Ok(1);
                }
            }
            Ok(0)
        }

        async fn read_logs(&self, _container_id: &str) -> CoreResult<Vec<u8>> {
            Ok(b"hi\n".to_vec())
        }

        async fn copy_between_containers(
            &self,
            _src_container: &str,
            _src_path: &str,
            _dst_container: &str,
            _dst_path: &str,
        ) -> CoreResult<()> {
            Ok(())
        }

        async fn read_file(&self, _container_id: &str, _path: &str) -> CoreResult<Vec<u8>> {
            Ok(b"data".to_vec())
        }

        async fn remove_container(&self, _container_id: &str) -> CoreResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        pipelines: StdMutex<Vec<PipelineId>>,
        finished: StdMutex<Vec<StageRunRecord>>,
    }

    #[async_trait]
    impl PipelineStore for FakeStore {
        async fn insert_pipeline(&self, id: PipelineId, _user_id: &str) -> CoreResult<()> {
            self.pipelines.lock().unwrap().push(id);
            Ok(())
        }

        async fn insert_stage_running(&self, _pipeline_id: PipelineId, _name: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn finish_stage(
            &self,
            _pipeline_id: PipelineId,
            _name: &str,
            record: &StageRunRecord,
        ) -> CoreResult<()> {
            self.finished.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn list_pipelines(&self, _user_id: &str) -> CoreResult<Vec<PipelineId>> {
            Ok(self.pipelines.lock().unwrap().clone())
        }

        async fn get_stages(
            &self,
            _pipeline_id: PipelineId,
            _user_id: &str,
        ) -> CoreResult<Vec<StageRunRecord>> {
            Ok(self.finished.lock().unwrap().clone())
        }
    }

    struct FakeArtifactStore;

    #[async_trait]
    impl ArtifactStore for FakeArtifactStore {
        async fn upload(&self, key: &str, _bytes: Vec<u8>) -> CoreResult<String> {
            Ok(format!("big-data-ci/{key}"))
        }
    }

    fn stage(script: &str, deps: Vec<&str>) -> StageMetadata {
        StageMetadata {
            script: vec![script.to_string()],
            depends_on: deps
                .into_iter()
                .map(|d| DependencyRef {
                    stage: d.to_string(),
                    fetch_artifacts: false,
                })
                .collect(),
            artifacts: vec![],
        }
    }

    #[tokio::test]
    async fn linear_pipeline_succeeds() {
        let mut stages = HashMap::new();
        stages.insert("a".to_string(), stage("echo hi", vec![]));
        stages.insert("b".to_string(), stage("echo hi", vec!["a"]));
        stages.insert("c".to_string(), stage("echo hi", vec!["b"]));
        let descriptor = PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        };

        let store = Arc::new(FakeStore::default());
        let scheduler = Scheduler::new(
            Arc::new(FakeRuntime::default()),
            store.clone(),
            Arc::new(FakeArtifactStore),
        );

        let outcome = scheduler.schedule(descriptor, "client-1").await.unwrap();
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(store.pipelines.lock().unwrap().len(), 1);
        assert_eq!(store.finished.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cycle_is_rejected_with_no_persisted_rows() {
        let mut stages = HashMap::new();
        stages.insert("a".to_string(), stage("echo hi", vec!["b"]));
        stages.insert("b".to_string(), stage("echo hi", vec!["a"]));
        let descriptor = PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        };

        let store = Arc::new(FakeStore::default());
        let scheduler = Scheduler::new(
            Arc::new(FakeRuntime::default()),
            store.clone(),
            Arc::new(FakeArtifactStore),
        );

        let outcome = scheduler.schedule(descriptor, "client-1").await.unwrap();
        assert_eq!(outcome, Outcome::BadPipeline);
        assert!(store.pipelines.lock().unwrap().is_empty());
        assert!(store.finished.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mid_pipeline_failure_aborts() {
        let mut stages = HashMap::new();
        stages.insert("a".to_string(), stage("echo hi", vec![]));
        stages.insert("b".to_string(), stage("exit 1", vec![]));
        let descriptor = PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        };

        let store = Arc::new(FakeStore::default());
        let scheduler = Scheduler::new(
            Arc::new(FakeRuntime {
                fail_stage: Some("b".to_string()),
            }),
            store.clone(),
            Arc::new(FakeArtifactStore),
        );

        let outcome = scheduler.schedule(descriptor, "client-1").await.unwrap();
        assert_eq!(outcome, Outcome::Abort);
    }

    #[tokio::test]
    async fn dependency_on_undeclared_stage_reports_unknown_stage() {
        // "ghost" is never declared as a real stage. A forward-declared
        // node always has zero dependencies of its own, so it is always
        // part of the initial ready set.
        let mut stages = HashMap::new();
        stages.insert("a".to_string(), stage("echo hi", vec![]));
        stages.insert("b".to_string(), stage("echo hi", vec!["ghost"]));
        let descriptor = PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        };

        let store = Arc::new(FakeStore::default());
        let scheduler = Scheduler::new(
            Arc::new(FakeRuntime::default()),
            store.clone(),
            Arc::new(FakeArtifactStore),
        );

        let outcome = scheduler.schedule(descriptor, "client-1").await.unwrap();
        assert_eq!(outcome, Outcome::UnknownStage);
    }
}
