//! In-memory fakes of the client traits for unit tests.

use async_trait::async_trait;
use image::Rgba;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::image_model::{GeneratedImage, ImageModel, ModelError};
use super::image_processor::sample_png;
use super::object_store::{validate_key, ObjectStore, ObjectStoreError, StoreResult};

pub const TEST_BASE_URL: &str = "https://cdn.test/files";

/// Object store backed by a map. Uploads start failing once
/// `fail_after_uploads` uploads have succeeded.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: AtomicUsize,
    deletes: AtomicUsize,
    fail_after_uploads: Option<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(uploads: usize) -> Self {
        Self {
            fail_after_uploads: Some(uploads),
            ..Self::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, bytes: &[u8], key: &str, _content_type: &str) -> StoreResult<String> {
        validate_key(key)?;
        if let Some(limit) = self.fail_after_uploads {
            if self.uploads.load(Ordering::SeqCst) >= limit {
                return Err(ObjectStoreError::OperationFailed(format!(
                    "upload of {} failed",
                    key
                )));
            }
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.insert(key, bytes);
        Ok(self.public_url(key))
    }

    async fn download(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", TEST_BASE_URL, key)
    }

    fn signed_url(&self, key: &str, ttl_seconds: u64) -> StoreResult<String> {
        validate_key(key)?;
        Ok(format!("{}/signed/{}?ttl={}", TEST_BASE_URL, key, ttl_seconds))
    }
}

pub enum ModelReply {
    Image,
    NoImage,
    Error,
}

/// Image model that replays scripted replies, then answers with an image.
/// Every prompt it receives is recorded.
#[derive(Default)]
pub struct FakeImageModel {
    replies: Mutex<VecDeque<ModelReply>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeImageModel {
    pub const VERSION: &'static str = "fake-image-model-1";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageModel for FakeImageModel {
    async fn generate(&self, prompt: &str) -> Result<Option<GeneratedImage>, ModelError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ModelReply::Image);

        match reply {
            ModelReply::Image => Ok(Some(GeneratedImage {
                // Vary the pixels so every call hashes differently
                data: sample_png(48, 64, Rgba([call as u8, 120, 200, 255])),
                mime_type: "image/png".to_string(),
            })),
            ModelReply::NoImage => Ok(None),
            ModelReply::Error => Err(ModelError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            }),
        }
    }

    fn model_version(&self) -> &str {
        Self::VERSION
    }
}
