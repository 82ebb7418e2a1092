//! Blob store backends used to host pass artifacts and design previews

use async_trait::async_trait;
use passmint_common::{BlobStore, Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(Error::Validation(format!("invalid blob key: {:?}", key)));
    }
    Ok(())
}

/// Writes blobs under a local directory that the API serves at `/files`.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        check_key(key)?;

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(format!("{}/files/{}", self.public_base_url, key))
    }
}

/// Uploads blobs to an S3-compatible endpoint with path-style object PUTs.
pub struct HttpBlobStore {
    endpoint: String,
    bucket: String,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        check_key(key)?;

        let url = self.object_url(key);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("upload to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "upload to {} returned {}",
                url,
                response.status()
            )));
        }

        info!("Uploaded {}", url);
        Ok(url)
    }
}

/// Keeps blobs in memory; for tests and local runs without a bucket.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes and content type for `key`.
    pub async fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.blobs.read().await.get(key).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        check_key(key)?;
        self.blobs
            .write()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_key_validation() {
        assert!(check_key("passes/apple/abc.pkpass").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("designs/../../secret").is_err());
    }

    #[tokio::test]
    async fn test_fs_store_writes_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "http://localhost:8000/");

        let url = store
            .put("designs/logo.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8000/files/designs/logo.png");
        let written = std::fs::read(dir.path().join("designs/logo.png")).unwrap();
        assert_eq!(written, b"png");
    }

    #[tokio::test]
    async fn test_fs_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "http://localhost:8000");

        let err = store
            .put("../escape", b"x".to_vec(), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_http_store_puts_object() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/passmint/passes/apple/p.pkpass"))
            .and(header("content-type", "application/vnd.apple.pkpass"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(&server.uri(), "passmint");
        let url = store
            .put(
                "passes/apple/p.pkpass",
                vec![1, 2, 3],
                "application/vnd.apple.pkpass",
            )
            .await
            .unwrap();

        assert_eq!(url, format!("{}/passmint/passes/apple/p.pkpass", server.uri()));
    }

    #[tokio::test]
    async fn test_http_store_maps_failures() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(&server.uri(), "passmint");
        let err = store
            .put("designs/x.png", vec![0], "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryBlobStore::new();
        let url = store.put("a/b", vec![9], "text/plain").await.unwrap();

        assert_eq!(url, "memory://a/b");
        assert_eq!(store.get("a/b").await.unwrap().0, vec![9]);
        assert_eq!(store.object_count().await, 1);
    }
}
