//! PostgreSQL implementation of `PipelineStore`.

use async_trait::async_trait;
use kiln_core::ids::PipelineId;
use kiln_core::ports::PipelineStore;
use kiln_core::state::{StageRunRecord, StageStatus};
use kiln_core::{Error, Result};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

/// PostgreSQL implementation of `PipelineStore`. `pipeline_id` is stored as
/// its bare-UUID text form, matching the `TEXT PRIMARY KEY` schema.
#[derive(Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(pipeline_id: PipelineId, row: &sqlx::postgres::PgRow) -> Result<StageRunRecord> {
        let status_str: String = row.get("status");
        let status = StageStatus::from_str(&status_str)
            .ok_or_else(|| Error::Infra(format!("unrecognized stage status: {status_str}")))?;
        Ok(StageRunRecord {
            pipeline_id,
            name: row.get("name"),
            status,
            message: row.get("message"),
            artifact_urls: row.get("artifact_urls"),
        })
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    #[instrument(skip(self))]
    async fn insert_pipeline(&self, id: PipelineId, user_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO pipelines (id, user_id) VALUES ($1, $2)")
            .bind(id.to_string())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Infra(format!("insert pipeline failed: {e}")))?;
        debug!(pipeline_id = %id, "pipeline row inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn insert_stage_running(&self, pipeline_id: PipelineId, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO stages (pipeline_id, name, status, message, artifact_urls) VALUES ($1, $2, 'RUNNING', '', '{}')",
        )
        .bind(pipeline_id.to_string())
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Infra(format!("insert stage running failed: {e}")))?;
        debug!(pipeline_id = %pipeline_id, stage = name, "stage row inserted as RUNNING");
        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn finish_stage(
        &self,
        pipeline_id: PipelineId,
        name: &str,
        record: &StageRunRecord,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE stages SET status = $3, message = $4, artifact_urls = $5 WHERE pipeline_id = $1 AND name = $2",
        )
        .bind(pipeline_id.to_string())
        .bind(name)
        .bind(record.status.as_str())
        .bind(&record.message)
        .bind(&record.artifact_urls)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Infra(format!("finish stage failed: {e}")))?;
        debug!(pipeline_id = %pipeline_id, stage = name, status = record.status.as_str(), "stage row finished");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pipelines(&self, user_id: &str) -> Result<Vec<PipelineId>> {
        let rows = sqlx::query("SELECT id FROM pipelines WHERE user_id = $1 ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Infra(format!("list pipelines failed: {e}")))?;

        debug!(user_id, count = rows.len(), "pipelines listed");
        rows.into_iter()
            .map(|row| {
                let id_str: String = row.get("id");
                id_str
                    .parse::<PipelineId>()
                    .map_err(|e| Error::Infra(format!("stored pipeline id malformed: {e}")))
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn get_stages(
        &self,
        pipeline_id: PipelineId,
        user_id: &str,
    ) -> Result<Vec<StageRunRecord>> {
        let rows = sqlx::query(
            "SELECT s.name, s.status, s.message, s.artifact_urls \
             FROM stages s JOIN pipelines p ON p.id = s.pipeline_id \
             WHERE s.pipeline_id = $1 AND p.user_id = $2",
        )
        .bind(pipeline_id.to_string())
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Infra(format!("get stages failed: {e}")))?;

        debug!(pipeline_id = %pipeline_id, count = rows.len(), "stages fetched");
        rows.iter()
            .map(|row| Self::row_to_record(pipeline_id, row))
            .collect()
    }
}
