use crate::adapters::storage::{ObjectStorage, join_url};
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    #[must_use]
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        let public_base_url = config.public_base_url.clone().unwrap_or_else(|| match &config.endpoint {
            Some(endpoint) => join_url(endpoint, &config.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", config.bucket, config.region),
        });
        Self { client, bucket: config.bucket.clone(), public_base_url }
    }

    /// Builds an S3 client from configuration, honoring custom endpoints and static credentials.
    pub async fn client_from_config(config: &StorageConfig) -> Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style).build();
        Client::from_conf(s3_config)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[tracing::instrument(level = "debug", skip(self, body), fields(size = body.len()), err)]
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let content_length = i64::try_from(body.len()).unwrap_or(i64::MAX);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, key = %key, "S3 Upload failed");
                AppError::Internal
            })?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }

    async fn ping(&self) -> Result<()> {
        self.client.head_bucket().bucket(&self.bucket).send().await.map_err(|e| {
            tracing::warn!(error = ?e, bucket = %self.bucket, "S3 bucket check failed");
            AppError::InternalMsg("object storage unreachable".into())
        })?;
        Ok(())
    }
}
