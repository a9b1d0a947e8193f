//! S3-compatible object-store adapter.

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use kiln_core::ports::{ArtifactStore, CredentialsProvider, ObjectStoreCredentials};
use kiln_core::{Error, Result};

/// Uploads artifact bytes to a fixed bucket under the deterministic key
/// scheme `<pipeline_id>/<stage_name>/artifacts/<filename>`.
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub async fn new(credentials_provider: &dyn CredentialsProvider, bucket: impl Into<String>) -> Result<Self> {
        let ObjectStoreCredentials {
            access_key_id,
            secret_access_key,
            region,
        } = credentials_provider.object_store_credentials().await?;

        let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "kiln");
        let config = aws_sdk_s3::Config::builder()
            .region(Region::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest()
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket: bucket.into(),
        })
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| Error::Infra(format!("artifact upload failed: {e}")))?;

        Ok(format!("{}/{}", self.bucket, key))
    }
}

/// Reads resolved credentials from environment variables, matching the
/// three keys the secret store hands the process at startup.
pub struct EnvCredentialsProvider;

#[async_trait]
impl CredentialsProvider for EnvCredentialsProvider {
    async fn object_store_credentials(&self) -> Result<ObjectStoreCredentials> {
        let var = |name: &'static str| {
            std::env::var(name).map_err(|_| Error::Infra(format!("missing env var {name}")))
        };
        Ok(ObjectStoreCredentials {
            access_key_id: var("AWS_ACCESS_KEY_ID")?,
            secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
            region: var("AWS_REGION")?,
        })
    }
}
