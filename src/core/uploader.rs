use crate::adapters::storage;
use crate::config::connections::ConnectionRegistry;
use crate::domain::model::{BlobIdentity, UploadTarget};
use crate::domain::ports::BlobStore;
use crate::utils::error::{EtlError, Result, UploadError};
use std::path::Path;
use std::sync::Arc;

/// Pushes staged files to the batch's object store.
///
/// The destination connection is resolved once, when the uploader is built. A
/// failed resolution is kept and returned by every upload of the batch.
pub struct Uploader {
    target: UploadTarget,
    store: std::result::Result<Arc<dyn BlobStore>, UploadError>,
}

impl Uploader {
    pub async fn resolve(registry: &ConnectionRegistry, target: UploadTarget) -> Self {
        let store = match registry.get(&target.conn_id) {
            Err(_) => Err(UploadError::InvalidCredential {
                conn_id: target.conn_id.clone(),
                reason: "connection record not found".to_string(),
            }),
            Ok(connection) => match connection.connection_string() {
                None => Err(UploadError::InvalidCredential {
                    conn_id: target.conn_id.clone(),
                    reason: "no 'connection_string' in connection extra".to_string(),
                }),
                Some(connection_string) => {
                    storage::connect(&target.conn_id, connection_string).await
                }
            },
        };

        let uploader = Self { target, store };
        if let Some(e) = uploader.credential_error() {
            tracing::error!("Upload destination unavailable: {}", e);
        }
        uploader
    }

    pub fn with_store(target: UploadTarget, store: Arc<dyn BlobStore>) -> Self {
        Self {
            target,
            store: Ok(store),
        }
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    pub fn credential_error(&self) -> Option<&UploadError> {
        self.store.as_ref().err()
    }

    /// Uploads `local_path` under its base name, overwriting an existing blob.
    pub async fn upload(&self, local_path: &Path) -> Result<BlobIdentity> {
        let store = self.store.as_ref().map_err(|e| EtlError::from(e.clone()))?;
        let blob_name = blob_name_for(local_path)?;
        let data = std::fs::read(local_path)?;

        let blob = store
            .upload(&self.target.container_name, &blob_name, data)
            .await?;
        tracing::debug!(
            "Uploaded {} to container {}",
            local_path.display(),
            self.target.container_name
        );
        Ok(blob)
    }
}

pub fn blob_name_for(local_path: &Path) -> Result<String> {
    local_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| EtlError::InvalidConfigValueError {
            field: "local_path".to_string(),
            value: local_path.display().to_string(),
            reason: "path has no usable file name".to_string(),
        })
}
