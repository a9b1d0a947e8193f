//! `ContainerRuntime` backed by the Docker Engine API.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use futures::StreamExt;
use kiln_core::ports::ContainerRuntime;
use kiln_core::{Error, Result};
use tracing::{debug, warn};

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using `DOCKER_HOST` (or the platform default socket) per
    /// the container runtime endpoint configuration.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Infra(format!("failed to connect to docker: {e}")))?;
        Ok(Self { docker })
    }

    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull_image(&self, reference: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| Error::Infra(format!("image pull failed: {e}")))?;
        }
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        image_reference: &str,
        command: &str,
    ) -> Result<String> {
        let config = Config {
            image: Some(image_reference.to_string()),
            cmd: Some(vec!["sh".to_string(), "-c".to_string(), command.to_string()]),
            tty: Some(false),
            host_config: Some(bollard::models::HostConfig {
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name,
            platform: None,
        };
        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| Error::Infra(format!("container create failed: {e}")))?;
        Ok(created.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Infra(format!("container start failed: {e}")))
    }

    async fn wait_container(&self, container_id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(container_id, Some(options));
        match stream.next().await {
            Some(Ok(result)) => Ok(result.status_code),
            Some(Err(e)) => Err(Error::Infra(format!("container wait failed: {e}"))),
            None => Err(Error::Infra("container wait returned no result".to_string())),
        }
    }

    async fn read_logs(&self, container_id: &str) -> Result<Vec<u8>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(container_id, Some(options));
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    bytes.extend_from_slice(&message);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, container = container_id, "error reading container logs");
                    break;
                }
            }
        }
        Ok(bytes)
    }

    async fn copy_between_containers(
        &self,
        src_container: &str,
        src_path: &str,
        dst_container: &str,
        dst_path: &str,
    ) -> Result<()> {
        let download_options = DownloadFromContainerOptions { path: src_path };
        let mut stream = self
            .docker
            .download_from_container(src_container, Some(download_options));
        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| Error::Infra(format!("artifact copy read failed: {e}")))?;
            archive.extend_from_slice(&chunk);
        }

        let upload_options = UploadToContainerOptions {
            path: dst_path,
            ..Default::default()
        };
        self.docker
            .upload_to_container(dst_container, Some(upload_options), archive.into())
            .await
            .map_err(|e| Error::Infra(format!("artifact copy write failed: {e}")))?;
        debug!(src_container, src_path, dst_container, dst_path, "copied artifact between containers");
        Ok(())
    }

    async fn read_file(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        let options = DownloadFromContainerOptions { path };
        let mut stream = self
            .docker
            .download_from_container(container_id, Some(options));
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Infra(format!("artifact read failed: {e}")))?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(Error::Infra(format!("container remove failed: {e}"))),
        }
    }
}
