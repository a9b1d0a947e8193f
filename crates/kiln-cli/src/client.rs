//! Thin HTTP client over the four endpoints the scheduler is fronted by.

use crate::config::CliConfig;
use kiln_core::pipeline::PipelineDescriptor;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    Request(reqwest::Error),
    LimitReached,
    BadPipeline(String),
    Server(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Request(e) => write!(f, "request failed: {e}"),
            ApiError::LimitReached => write!(f, "rate limit reached, try again shortly"),
            ApiError::BadPipeline(msg) => write!(f, "pipeline rejected: {msg}"),
            ApiError::Server(msg) => write!(f, "server error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

pub struct ApiClient {
    client: Client,
    base_url: String,
    client_id: String,
}

impl ApiClient {
    pub fn new(config: &CliConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .header("x-client-id", self.client_id.as_str())
    }

    /// Submit a pipeline descriptor to `/execute`. Returns once the scheduler
    /// has accepted the request; it does not wait for the pipeline to finish.
    pub async fn execute(&self, descriptor: &PipelineDescriptor) -> Result<(), ApiError> {
        let res = self
            .request(reqwest::Method::POST, "/execute")
            .json(descriptor)
            .send()
            .await
            .map_err(ApiError::Request)?;

        match res.status() {
            StatusCode::ACCEPTED => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::LimitReached),
            StatusCode::BAD_REQUEST => {
                let body = res.text().await.unwrap_or_default();
                Err(ApiError::BadPipeline(body))
            }
            status => Err(ApiError::Server(status.to_string())),
        }
    }

    pub async fn list_pipelines(&self) -> Result<Vec<String>, ApiError> {
        let res = self
            .request(reqwest::Method::GET, "/pipelines/")
            .send()
            .await
            .map_err(ApiError::Request)?;

        match res.status() {
            StatusCode::OK => {
                let body: ListPipelinesResponse = res.json().await.map_err(ApiError::Request)?;
                Ok(body.pipeline_ids)
            }
            status => Err(ApiError::Server(status.to_string())),
        }
    }

    pub async fn get_pipeline_stages(&self, pipeline_id: &str) -> Result<Vec<StageRow>, ApiError> {
        let res = self
            .request(reqwest::Method::GET, &format!("/pipelines/{pipeline_id}"))
            .send()
            .await
            .map_err(ApiError::Request)?;

        match res.status() {
            StatusCode::OK => res.json().await.map_err(ApiError::Request),
            status => Err(ApiError::Server(status.to_string())),
        }
    }

    pub async fn bulk_stage_lookup(
        &self,
        pipeline_ids: &[String],
    ) -> Result<HashMap<String, Vec<StageRow>>, ApiError> {
        let res = self
            .request(reqwest::Method::POST, "/stages")
            .json(pipeline_ids)
            .send()
            .await
            .map_err(ApiError::Request)?;

        match res.status() {
            StatusCode::OK => res.json().await.map_err(ApiError::Request),
            status => Err(ApiError::Server(status.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListPipelinesResponse {
    pipeline_ids: Vec<String>,
}

/// Mirrors `kiln_core::state::StageRunRecord`'s wire shape without pulling in
/// the core crate's `PipelineId` type, which the CLI only ever treats as a
/// display string.
#[derive(Debug, Deserialize)]
pub struct StageRow {
    pub name: String,
    pub status: String,
    pub message: String,
    pub artifact_urls: Vec<String>,
}
