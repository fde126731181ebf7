use crate::adapters::storage::ConnectionString;
use crate::domain::model::BlobIdentity;
use crate::domain::ports::BlobStore;
use crate::utils::error::UploadError;
use async_trait::async_trait;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Azure Blob Storage, configured from a standard storage account connection string.
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    conn_id: String,
    builder: MicrosoftAzureBuilder,
    endpoint: String,
}

impl AzureBlobStore {
    /// Reads `AccountName` with `AccountKey` or `SharedAccessSignature`, plus the optional
    /// `BlobEndpoint`, `DefaultEndpointsProtocol` and `EndpointSuffix`.
    /// `UseDevelopmentStorage=true` targets the local storage emulator.
    pub fn connect(conn_id: &str, parsed: &ConnectionString) -> Result<Self, UploadError> {
        let invalid = |reason: &str| UploadError::InvalidCredential {
            conn_id: conn_id.to_string(),
            reason: reason.to_string(),
        };

        if parsed
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self {
                conn_id: conn_id.to_string(),
                builder: MicrosoftAzureBuilder::new().with_use_emulator(true),
                endpoint: "http://127.0.0.1:10000/devstoreaccount1".to_string(),
            });
        }

        let account = parsed.require(conn_id, "AccountName")?;
        let mut builder = MicrosoftAzureBuilder::new().with_account(account);
        builder = match (parsed.get("AccountKey"), parsed.get("SharedAccessSignature")) {
            (Some(key), _) => builder.with_access_key(key),
            (None, Some(sas)) => builder.with_config(AzureConfigKey::SasKey, sas),
            (None, None) => {
                return Err(invalid(
                    "connection string has neither AccountKey nor SharedAccessSignature",
                ))
            }
        };

        let suffix = parsed
            .get("EndpointSuffix")
            .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
        let endpoint = match parsed.get("BlobEndpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let protocol = parsed.get("DefaultEndpointsProtocol").unwrap_or("https");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
        };
        if parsed.get("BlobEndpoint").is_some() || suffix != DEFAULT_ENDPOINT_SUFFIX {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        Ok(Self {
            conn_id: conn_id.to_string(),
            builder,
            endpoint,
        })
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
    ) -> Result<BlobIdentity, UploadError> {
        let store = self
            .builder
            .clone()
            .with_container_name(container)
            .build()
            .map_err(|e| UploadError::InvalidCredential {
                conn_id: self.conn_id.clone(),
                reason: e.to_string(),
            })?;

        store
            .put(&ObjectPath::from(blob_name), PutPayload::from(data))
            .await
            .map_err(|e| UploadError::Transport {
                blob_name: blob_name.to_string(),
                message: e.to_string(),
            })?;

        Ok(BlobIdentity {
            container: container.to_string(),
            blob_name: blob_name.to_string(),
            location: format!("{}/{}/{}", self.endpoint, container, blob_name),
        })
    }
}
