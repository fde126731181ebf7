use crate::adapters::storage::ConnectionString;
use crate::domain::model::BlobIdentity;
use crate::domain::ports::BlobStore;
use crate::utils::error::UploadError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

/// Amazon S3, or any S3-compatible endpoint. Containers map to buckets.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: S3Client,
}

impl S3BlobStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Reads `Region` (required), `Endpoint`, `AccessKeyId` and `SecretAccessKey`.
    /// Without keys the default AWS credential chain is used.
    pub async fn connect(conn_id: &str, parsed: &ConnectionString) -> Result<Self, UploadError> {
        let region = parsed.require(conn_id, "Region")?.to_string();
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .region(Region::new(region))
            .force_path_style(true);
        if let Some(endpoint) = parsed.get("Endpoint") {
            builder = builder.endpoint_url(endpoint);
        }
        match (parsed.get("AccessKeyId"), parsed.get("SecretAccessKey")) {
            (Some(key), Some(secret)) => {
                builder = builder.credentials_provider(Credentials::new(
                    key,
                    secret,
                    None,
                    None,
                    "connection-string",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(UploadError::InvalidCredential {
                    conn_id: conn_id.to_string(),
                    reason: "AccessKeyId and SecretAccessKey must be given together".to_string(),
                })
            }
        }

        Ok(Self::new(S3Client::from_conf(builder.build())))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
    ) -> Result<BlobIdentity, UploadError> {
        self.client
            .put_object()
            .bucket(container)
            .key(blob_name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                UploadError::Transport {
                    blob_name: blob_name.to_string(),
                    message: format!(
                        "{}: {}",
                        service.code().unwrap_or("unknown"),
                        service.message().unwrap_or("no message")
                    ),
                }
            })?;

        Ok(BlobIdentity {
            container: container.to_string(),
            blob_name: blob_name.to_string(),
            location: format!("s3://{}/{}", container, blob_name),
        })
    }
}
