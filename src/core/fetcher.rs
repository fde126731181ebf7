use crate::adapters::http::HttpConnection;
use crate::core::staging::StagingArea;
use crate::domain::model::{FileDescriptor, StagedFile};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_flat_file_name;
use reqwest::StatusCode;

/// Downloads raw files through a named connection into the staging area.
#[derive(Debug, Clone)]
pub struct Fetcher {
    connection: HttpConnection,
    base_path: String,
}

impl Fetcher {
    /// `base_path` is the endpoint prefix that file names are appended to.
    pub fn new(connection: HttpConnection, base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        Self {
            connection,
            base_path,
        }
    }

    pub fn endpoint_for(&self, name: &str) -> String {
        format!("{}{}", self.base_path, name)
    }

    /// Fetches one file and stages it, replacing any earlier copy.
    ///
    /// A failed download also removes the earlier copy, so a later load never
    /// picks up stale content for a file whose fetch failed.
    pub async fn fetch_file(&self, name: &str, staging: &StagingArea) -> Result<StagedFile> {
        validate_flat_file_name("file name", name).map_err(|e| EtlError::FetchError {
            name: name.to_string(),
            status: None,
            message: e.to_string(),
        })?;

        let result = self.download(name, staging).await;
        if result.is_err() {
            match staging.remove(name) {
                Ok(true) => tracing::info!(file = name, "Removed stale staged copy"),
                Ok(false) => {}
                Err(e) => tracing::warn!(file = name, error = %e, "Could not remove stale staged copy"),
            }
        }
        result
    }

    async fn download(&self, name: &str, staging: &StagingArea) -> Result<StagedFile> {
        let fetch_error = |status: Option<u16>, message: String| EtlError::FetchError {
            name: name.to_string(),
            status,
            message,
        };

        let response = self
            .connection
            .get(&self.endpoint_for(name))
            .await
            .map_err(|e| fetch_error(None, format!("request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(fetch_error(
                Some(status.as_u16()),
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(Some(status.as_u16()), format!("body read failed: {}", e)))?;

        let staged = staging
            .write(name, body.to_vec())
            .map_err(|e| fetch_error(Some(status.as_u16()), format!("could not stage: {}", e)))?;
        tracing::info!(
            file = name,
            conn = self.connection.conn_id(),
            bytes = staged.content.len(),
            "Fetched"
        );
        Ok(staged)
    }

    /// One result per listed file, in listing order.
    pub async fn fetch_all(
        &self,
        files: &[FileDescriptor],
        staging: &StagingArea,
    ) -> Vec<(String, Result<StagedFile>)> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let result = self.fetch_file(&file.name, staging).await;
            results.push((file.name.clone(), result));
        }
        results
    }
}
