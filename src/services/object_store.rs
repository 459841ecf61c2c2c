use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::utils::auth::create_object_token;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store operation failed: {0}")]
    OperationFailed(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

pub type StoreResult<T> = Result<T, ObjectStoreError>;

/// Blob storage for generated sheets. Objects are addressed by string keys
/// such as `sheets/{name}.png` and exposed at `{public_base_url}/{key}`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return its public URL.
    async fn upload(&self, bytes: &[u8], key: &str, content_type: &str) -> StoreResult<String>;

    /// `Ok(None)` when the object does not exist.
    async fn download(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    fn public_url(&self, key: &str) -> String;

    /// Time-limited URL for `key`, valid for `ttl_seconds`.
    fn signed_url(&self, key: &str, ttl_seconds: u64) -> StoreResult<String>;
}

/// Reject absolute keys, `..`, and empty segments.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let bad_segment = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if key.is_empty() || bad_segment {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    let all_normal = Path::new(key)
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !all_normal {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Files under a storage directory, served back by this service.
pub struct LocalObjectStore {
    base_dir: PathBuf,
    public_base_url: String,
    signing_secret: String,
}

impl LocalObjectStore {
    pub fn new(base_dir: PathBuf, public_base_url: &str, signing_secret: &str) -> Self {
        Self {
            base_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signing_secret: signing_secret.to_string(),
        }
    }

    fn resolve_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, bytes: &[u8], key: &str, content_type: &str) -> StoreResult<String> {
        let path = self.resolve_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                log::error!("Failed to create directory for {}: {}", key, e);
                ObjectStoreError::OperationFailed(format!("upload of {} failed", key))
            })?;
        }

        // Write then rename so readers never see a partial object
        let temp_path = path.with_extension("partial");
        let write_result = async {
            fs::write(&temp_path, bytes).await?;
            fs::rename(&temp_path, &path).await
        }
        .await;
        if let Err(e) = write_result {
            log::error!("Failed to upload {}: {}", key, e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(ObjectStoreError::OperationFailed(format!(
                "upload of {} failed",
                key
            )));
        }

        log::debug!("Stored {} ({} bytes, {})", key, bytes.len(), content_type);
        Ok(self.public_url(key))
    }

    async fn download(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.resolve_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                log::error!("Failed to read {}: {}", key, e);
                Err(ObjectStoreError::OperationFailed(format!(
                    "download of {} failed",
                    key
                )))
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.resolve_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                log::error!("Failed to delete {}: {}", key, e);
                Err(ObjectStoreError::OperationFailed(format!(
                    "delete of {} failed",
                    key
                )))
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    fn signed_url(&self, key: &str, ttl_seconds: u64) -> StoreResult<String> {
        validate_key(key)?;
        let token = create_object_token(key, &self.signing_secret, ttl_seconds)
            .map_err(|e| ObjectStoreError::OperationFailed(format!("signing failed: {}", e)))?;
        Ok(format!("{}/signed/{}", self.public_base_url, token))
    }
}
