//! Where rendered image variants are kept
//!
//! [`LocalImageStore`] writes below a directory that the server exposes
//! under `/uploads`. [`RemoteImageStore`] (feature `remote-images`) hands
//! the bytes to an external image host over HTTP.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::ImageStorageConfig;
use crate::core::error::{ApiError, Result, StorageError};

/// Storage backend for image files
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store bytes under `key` and return the public URL
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Remove the file under `key`; missing files are not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Build the store selected by configuration
pub fn image_store_from_config(config: &ImageStorageConfig) -> Result<Arc<dyn ImageStore>> {
    match config {
        ImageStorageConfig::Local {
            dir,
            public_base_url,
        } => Ok(Arc::new(LocalImageStore::new(dir.clone(), public_base_url))),

        #[cfg(feature = "remote-images")]
        ImageStorageConfig::Remote {
            endpoint,
            public_base_url,
            api_key,
        } => Ok(Arc::new(RemoteImageStore::new(
            endpoint,
            public_base_url,
            api_key.clone(),
        )?)),

        #[cfg(not(feature = "remote-images"))]
        ImageStorageConfig::Remote { .. } => Err(ApiError::internal(
            "remote image storage requires the 'remote-images' feature",
        )),
    }
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Keys are relative paths without `..` or root components
fn checked_key(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(path)
    } else {
        Err(ApiError::internal(format!("refusing unsafe image key '{key}'")))
    }
}

// =============================================================================
// Local filesystem
// =============================================================================

#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn io_error(err: std::io::Error) -> ApiError {
    StorageError::backend("filesystem", err).into()
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.root.join(checked_key(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;

        tracing::debug!(key, "stored image file");
        Ok(join_url(&self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.root.join(checked_key(key)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

// =============================================================================
// Remote image host
// =============================================================================

#[cfg(feature = "remote-images")]
pub use remote::RemoteImageStore;

#[cfg(feature = "remote-images")]
mod remote {
    use super::*;
    use reqwest::StatusCode;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

    /// Forwards files to `{endpoint}/{key}` with PUT and DELETE
    #[derive(Debug, Clone)]
    pub struct RemoteImageStore {
        client: reqwest::Client,
        endpoint: String,
        public_base_url: String,
        api_key: Option<String>,
    }

    fn remote_error(err: impl std::fmt::Display) -> ApiError {
        StorageError::backend("image host", err).into()
    }

    impl RemoteImageStore {
        pub fn new(endpoint: &str, public_base_url: &str, api_key: Option<String>) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(remote_error)?;
            Ok(Self {
                client,
                endpoint: endpoint.to_string(),
                public_base_url: public_base_url.to_string(),
                api_key,
            })
        }

        fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
            let mut builder = self.client.request(method, join_url(&self.endpoint, key));
            if let Some(api_key) = &self.api_key {
                builder = builder.header(AUTHORIZATION, format!("Bearer {api_key}"));
            }
            builder
        }
    }

    #[async_trait]
    impl ImageStore for RemoteImageStore {
        async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
            checked_key(key)?;
            let response = self
                .request(reqwest::Method::PUT, key)
                .header(CONTENT_TYPE, content_type)
                .body(bytes)
                .send()
                .await
                .map_err(remote_error)?;

            if !response.status().is_success() {
                return Err(remote_error(format!(
                    "upload of '{key}' failed with status {}",
                    response.status()
                )));
            }
            Ok(join_url(&self.public_base_url, key))
        }

        async fn delete(&self, key: &str) -> Result<()> {
            checked_key(key)?;
            let response = self
                .request(reqwest::Method::DELETE, key)
                .send()
                .await
                .map_err(remote_error)?;

            match response.status() {
                s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
                s => Err(remote_error(format!("delete of '{key}' failed with status {s}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "/uploads/");

        let url = store
            .put("products/p1/i1/thumbnail.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "/uploads/products/p1/i1/thumbnail.jpg");

        let path = dir.path().join("products/p1/i1/thumbnail.jpg");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        store.delete("products/p1/i1/thumbnail.jpg").await.unwrap();
        assert!(!path.exists());

        // Already gone
        store.delete("products/p1/i1/thumbnail.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "/uploads");

        assert!(store.put("../evil.jpg", vec![0], "image/jpeg").await.is_err());
        assert!(store.put("/etc/evil.jpg", vec![0], "image/jpeg").await.is_err());
        assert!(store.delete("a/../../b").await.is_err());
    }

    #[test]
    fn test_store_from_config() {
        let config = ImageStorageConfig::default();
        assert!(image_store_from_config(&config).is_ok());
    }
}
