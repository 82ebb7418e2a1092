//! Durable blob storage collaborator

use async_trait::async_trait;

use crate::error::Result;

/// Stores raw bytes under a key and hands back a URL they can be fetched from.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
