//! Error taxonomy for the pipeline scheduler.

use thiserror::Error;

/// Top-level outcomes of a scheduling attempt, matching the taxonomy the
/// scheduler loop and HTTP boundary agree on.
#[derive(Debug, Error)]
pub enum Error {
    /// The pipeline was rejected before any stage launched: a cycle in the
    /// dependency graph, no stages, a malformed image reference, or an
    /// unknown dependency target discovered at run time.
    #[error("bad pipeline: {0}")]
    BadPipeline(#[from] BadPipelineReason),

    /// A stage returned a non-zero exit status; the pipeline is marked failed.
    #[error("pipeline aborted: stage {stage} failed: {message}")]
    Abort { stage: String, message: String },

    /// The rate limiter refused the request.
    #[error("rate limit reached")]
    LimitReached,

    /// Transient failure contacting the container runtime, the persistence
    /// store, the object store, or the secret store.
    #[error("infrastructure error: {0}")]
    Infra(String),
}

/// Specific reasons a pipeline is rejected as `BAD_PIPELINE`.
#[derive(Debug, Error)]
pub enum BadPipelineReason {
    #[error("dependency cycle detected")]
    Cycle,

    #[error("pipeline has no stages")]
    EmptyPipeline,

    #[error("stage '{0}' has no script and no later definition")]
    UnknownStage(String),

    #[error("stage '{0}' has an empty script")]
    EmptyScript(String),

    #[error("malformed image reference: {0}")]
    BadImage(String),
}

/// Leaf cause of a stage-level infrastructure failure. Always converted into
/// a synthetic non-zero exit status by the stage runner, never propagated
/// past it.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("artifact copy failed: {0}")]
    ArtifactCopyFailed(String),

    #[error("image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("container create failed: {0}")]
    ContainerCreateFailed(String),

    #[error("container start failed: {0}")]
    ContainerStartFailed(String),

    #[error("container wait failed: {0}")]
    ContainerWaitFailed(String),

    #[error("artifact upload failed: {0}")]
    ArtifactUploadFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<StageError> for Error {
    fn from(err: StageError) -> Self {
        Error::Infra(err.to_string())
    }
}
