//! Filesystem-backed `ArtifactStore`, substitutable for the S3 adapter in
//! local/dev and test builds.

use async_trait::async_trait;
use kiln_core::ports::ArtifactStore;
use kiln_core::{Error, Result};
use std::path::PathBuf;

pub struct FilesystemArtifactStore {
    root_dir: PathBuf,
}

impl FilesystemArtifactStore {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let path = self.root_dir.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Infra(format!("failed to create artifact dir: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::Infra(format!("failed to write artifact: {e}")))?;
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_writes_bytes_under_key_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf());

        let url = store
            .upload("pid/build/artifacts/out.txt", b"hello".to_vec())
            .await
            .unwrap();

        assert!(url.starts_with("file://"));
        let written = tokio::fs::read(dir.path().join("pid/build/artifacts/out.txt"))
            .await
            .unwrap();
        assert_eq!(written, b"hello");
    }
}
