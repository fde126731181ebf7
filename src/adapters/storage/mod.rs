//! Object-store backends, selected by the connection string of the upload connection.
//!
//! Connection strings are `Key=Value` pairs separated by `;`, for example
//! `Provider=local;Root=/srv/blobs` or `Provider=s3;Region=ap-southeast-2`.
//! A standard Azure storage connection string (`AccountName=...;AccountKey=...`)
//! needs no `Provider` key.

#[cfg(feature = "azure")]
pub mod azure;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use crate::domain::ports::BlobStore;
use crate::utils::error::UploadError;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "azure")]
pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: HashMap<String, String>,
}

impl ConnectionString {
    /// Keys are matched case-insensitively; values are kept verbatim.
    pub fn parse(conn_id: &str, raw: &str) -> Result<Self, UploadError> {
        let mut pairs = HashMap::new();
        let segments = raw.split(';').map(str::trim).filter(|p| !p.is_empty());
        for (idx, part) in segments.enumerate() {
            // Segment text may hold a secret, so only its position is reported.
            let (key, value) = part.split_once('=').ok_or_else(|| {
                UploadError::InvalidCredential {
                    conn_id: conn_id.to_string(),
                    reason: format!("connection string segment {} is not Key=Value", idx + 1),
                }
            })?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
        Ok(Self { pairs })
    }

    /// The explicit `Provider`, or `azure` for a storage account connection string.
    pub fn provider(&self) -> Option<String> {
        if let Some(provider) = self.get("Provider") {
            return Some(provider.to_ascii_lowercase());
        }
        ["AccountName", "BlobEndpoint", "UseDevelopmentStorage"]
            .iter()
            .any(|key| self.get(key).is_some())
            .then(|| "azure".to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, conn_id: &str, key: &str) -> Result<&str, UploadError> {
        self.get(key).ok_or_else(|| UploadError::InvalidCredential {
            conn_id: conn_id.to_string(),
            reason: format!("connection string has no {}", key),
        })
    }
}

/// Builds the store a connection string points at.
pub async fn connect(
    conn_id: &str,
    connection_string: &str,
) -> Result<Arc<dyn BlobStore>, UploadError> {
    let parsed = ConnectionString::parse(conn_id, connection_string)?;
    let provider = parsed
        .provider()
        .ok_or_else(|| UploadError::InvalidCredential {
            conn_id: conn_id.to_string(),
            reason: "connection string has no Provider".to_string(),
        })?;

    match provider.as_str() {
        "local" => Ok(Arc::new(LocalBlobStore::new(parsed.require(conn_id, "Root")?))),
        #[cfg(feature = "s3")]
        "s3" => Ok(Arc::new(S3BlobStore::connect(conn_id, &parsed).await?)),
        #[cfg(feature = "azure")]
        "azure" => Ok(Arc::new(AzureBlobStore::connect(conn_id, &parsed)?)),
        other => Err(UploadError::InvalidCredential {
            conn_id: conn_id.to_string(),
            reason: format!("unsupported object store provider '{}'", other),
        }),
    }
}
