use crate::domain::model::BlobIdentity;
use crate::domain::ports::BlobStore;
use crate::utils::error::UploadError;
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;

/// Stores blobs as files under `root/<container>/<blob>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
    ) -> Result<BlobIdentity, UploadError> {
        let transport = |e: std::io::Error| UploadError::Transport {
            blob_name: blob_name.to_string(),
            message: e.to_string(),
        };

        let dir = self.root.join(container);
        fs::create_dir_all(&dir).map_err(transport)?;
        let path = dir.join(blob_name);
        fs::write(&path, data).map_err(transport)?;

        Ok(BlobIdentity {
            container: container.to_string(),
            blob_name: blob_name.to_string(),
            location: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_overwrites_existing_blob() {
        let root = TempDir::new().unwrap();
        let store = LocalBlobStore::new(root.path());

        store.upload("jobs", "a.csv", b"first".to_vec()).await.unwrap();
        let blob = store.upload("jobs", "a.csv", b"second".to_vec()).await.unwrap();

        assert_eq!(blob.container, "jobs");
        assert_eq!(blob.blob_name, "a.csv");
        assert_eq!(fs::read(root.path().join("jobs/a.csv")).unwrap(), b"second");
    }
}
