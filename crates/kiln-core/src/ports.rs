//! Port traits (hexagonal architecture).
//!
//! These define the interfaces between the scheduler and its external
//! collaborators: the container runtime, the persistence store, the
//! object-store artifact adapter, and the credentials provider. The
//! scheduler loop and the stage runner depend only on these traits; the
//! concrete drivers (Docker, Postgres, S3) live in separate adapter crates.

use crate::ids::PipelineId;
use crate::state::StageRunRecord;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Abstract container runtime capability: pull, create, start, wait, copy,
/// remove. One `ContainerHandle` corresponds to one running or exited
/// container.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull an image. Idempotent; safe to call concurrently for the same
    /// reference.
    async fn pull_image(&self, reference: &str) -> Result<()>;

    /// Create a container running `sh -c <command>` with the given name, no
    /// TTY. Does not start it.
    async fn create_container(
        &self,
        name: &str,
        image_reference: &str,
        command: &str,
    ) -> Result<String>;

    /// Start a previously created container.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Block until the container exits, returning its exit status.
    async fn wait_container(&self, container_id: &str) -> Result<i64>;

    /// Read the combined stdout+stderr produced by the container.
    async fn read_logs(&self, container_id: &str) -> Result<Vec<u8>>;

    /// Stream a path out of `src_container` and into `dst_container` at
    /// `dst_path`.
    async fn copy_between_containers(
        &self,
        src_container: &str,
        src_path: &str,
        dst_container: &str,
        dst_path: &str,
    ) -> Result<()>;

    /// Stream a file out of a container to a local byte buffer, for upload.
    async fn read_file(&self, container_id: &str, path: &str) -> Result<Vec<u8>>;

    /// Remove a container. Safe to call on an already-removed container.
    async fn remove_container(&self, container_id: &str) -> Result<()>;
}

/// Persistence adapter for the two tables the scheduler writes:
/// `pipelines` and `stages`.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn insert_pipeline(&self, id: PipelineId, user_id: &str) -> Result<()>;

    async fn insert_stage_running(&self, pipeline_id: PipelineId, name: &str) -> Result<()>;

    async fn finish_stage(
        &self,
        pipeline_id: PipelineId,
        name: &str,
        record: &StageRunRecord,
    ) -> Result<()>;

    /// List pipeline ids owned by a client, most recent first.
    async fn list_pipelines(&self, user_id: &str) -> Result<Vec<PipelineId>>;

    /// Fetch every stage row for a pipeline, restricted to the caller's
    /// ownership.
    async fn get_stages(
        &self,
        pipeline_id: PipelineId,
        user_id: &str,
    ) -> Result<Vec<StageRunRecord>>;
}

/// Artifact adapter: inter-container copy and object-store upload.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a file's bytes to `bucket/<key>`, returning the resulting URL.
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String>;
}

/// Resolved AWS-style credentials used by the artifact adapter. Fetched
/// once per process, not per upload.
#[derive(Debug, Clone)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

/// Acquires credentials from whatever secret store the deployment uses.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn object_store_credentials(&self) -> Result<ObjectStoreCredentials>;
}

/// A map from dependency stage name to that stage's container id, handed to
/// a stage runner so it can copy artifacts in from its producers.
pub type ProducerContainers = HashMap<String, String>;
