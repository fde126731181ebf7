use crate::domain::model::{BlobIdentity, FileState};
use crate::utils::error::UploadError;
use async_trait::async_trait;

/// A destination object store, already bound to its credential.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `data` as `container/blob_name`, replacing any existing blob.
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
    ) -> Result<BlobIdentity, UploadError>;
}

/// Observability sink handed to the pipeline components.
pub trait PipelineObserver: Send + Sync {
    fn files_listed(&self, names: &[String]);
    fn transition(&self, name: &str, state: &FileState);
    fn warning(&self, name: &str, message: &str);
    fn batch_finished(&self, uploaded: usize, failed: usize);
}
