use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

/// Blob storage for profile photos.
#[async_trait]
pub trait ObjectStorage: Send + Sync + std::fmt::Debug + 'static {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// URL clients download the object from.
    fn public_url(&self, key: &str) -> String;

    async fn ping(&self) -> Result<()>;
}

/// Joins a base URL and an object key with exactly one slash.
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}
