//! Stage runner: the per-stage worker that drives one container through its
//! full lifecycle and reports a [`StageOutput`] back to the scheduler loop.

use kiln_core::error::StageError;
use kiln_core::ids::PipelineId;
use kiln_core::pipeline::{PipelineDescriptor, ResolvedImage};
use kiln_core::ports::{ArtifactStore, ContainerRuntime, ProducerContainers};
use kiln_core::sanitize::sanitize;
use kiln_core::state::StageOutput;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Launches exactly one container execution of `stage_name` and, on
/// termination, sends its [`StageOutput`] on `done_tx`. Never returns an
/// `Err`: every failure mode becomes a synthetic non-zero exit status so the
/// scheduler loop remains the sole decision-maker about pipeline
/// termination.
#[instrument(skip(pipeline, producer_container_ids, runtime, artifacts, done_tx), fields(pipeline_id = %pipeline_id, stage_name))]
pub async fn run_stage(
    pipeline_id: PipelineId,
    pipeline: Arc<PipelineDescriptor>,
    stage_name: String,
    producer_container_ids: ProducerContainers,
    runtime: Arc<dyn ContainerRuntime>,
    artifacts: Arc<dyn ArtifactStore>,
    done_tx: mpsc::Sender<StageOutput>,
) {
    let output = run_stage_inner(
        pipeline_id,
        &pipeline,
        &stage_name,
        &producer_container_ids,
        runtime.as_ref(),
        artifacts.as_ref(),
    )
    .await;

    if done_tx.send(output).await.is_err() {
        warn!(stage = %stage_name, "scheduler completion channel closed before stage output delivered");
    }
}

async fn run_stage_inner(
    pipeline_id: PipelineId,
    pipeline: &PipelineDescriptor,
    stage_name: &str,
    producer_container_ids: &ProducerContainers,
    runtime: &dyn ContainerRuntime,
    artifacts: &dyn ArtifactStore,
) -> StageOutput {
    let fail = |message: String| StageOutput {
        name: stage_name.to_string(),
        container_id: None,
        exit_status: 1,
        message,
        artifact_urls: vec![],
    };

    let resolved = match ResolvedImage::resolve(&pipeline.image) {
        Ok(r) => r,
        Err(reason) => return fail(format!("bad image reference: {reason}")),
    };
    let image_reference = resolved.full_reference();

    let Some(metadata) = pipeline.stages.get(stage_name) else {
        return fail(format!("stage '{stage_name}' has no script and no later definition"));
    };

    if let Err(e) = runtime.pull_image(&image_reference).await {
        return fail(StageError::ImagePullFailed(e.to_string()).to_string());
    }

    let container_name = format!("{pipeline_id}-{stage_name}");
    let command = metadata.script.join(" && ");
    let container_id = match runtime
        .create_container(&container_name, &image_reference, &command)
        .await
    {
        Ok(id) => id,
        Err(e) => return fail(StageError::ContainerCreateFailed(e.to_string()).to_string()),
    };

    for dep in metadata.depends_on.iter().filter(|d| d.fetch_artifacts) {
        let Some(producer_id) = producer_container_ids.get(&dep.stage) else {
            return fail(
                StageError::ArtifactCopyFailed(format!("producer '{}' has no container", dep.stage))
                    .to_string(),
            );
        };
        let Some(producer_meta) = pipeline.stages.get(&dep.stage) else {
            continue;
        };
        for artifact_path in &producer_meta.artifacts {
            if let Err(e) = runtime
                .copy_between_containers(producer_id, artifact_path, &container_id, "./")
                .await
            {
                return fail(StageError::ArtifactCopyFailed(e.to_string()).to_string());
            }
        }
    }

    if let Err(e) = runtime.start_container(&container_id).await {
        return fail(StageError::ContainerStartFailed(e.to_string()).to_string());
    }

    let exit_status = match runtime.wait_container(&container_id).await {
        Ok(status) => status,
        Err(e) => return fail(StageError::ContainerWaitFailed(e.to_string()).to_string()),
    };

    let logs = runtime.read_logs(&container_id).await.unwrap_or_default();
    let message = String::from_utf8_lossy(&sanitize(&logs)).into_owned();

    let mut artifact_urls = Vec::new();
    if exit_status == 0 {
        for artifact_path in &metadata.artifacts {
            let bytes = match runtime.read_file(&container_id, artifact_path).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(stage = stage_name, artifact = artifact_path, error = %e, "artifact upload skipped: read failed");
                    continue;
                }
            };
            let basename = Path::new(artifact_path)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| artifact_path.clone());
            let key = format!("{pipeline_id}/{stage_name}/artifacts/{basename}");
            match artifacts.upload(&key, bytes).await {
                Ok(url) => artifact_urls.push(url),
                Err(e) => {
                    let err = StageError::ArtifactUploadFailed(e.to_string());
                    warn!(stage = stage_name, artifact = artifact_path, %err, "artifact upload failed");
                }
            }
        }
    }

    info!(stage = stage_name, exit_status, "stage finished");

    StageOutput {
        name: stage_name.to_string(),
        container_id: Some(container_id),
        exit_status,
        message,
        artifact_urls,
    }
}
