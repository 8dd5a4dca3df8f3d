use crate::adapters::storage::{ObjectStorage, join_url};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Keeps objects in process memory; for development and tests.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    objects: Arc<DashMap<String, StoredObject>>,
    base_url: String,
}

impl MemoryStorage {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { objects: Arc::new(DashMap::new()), base_url: base_url.into() }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory://photos")
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.objects.insert(key.to_string(), StoredObject { body, content_type: content_type.to_string() });
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
