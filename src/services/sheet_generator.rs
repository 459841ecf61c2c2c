use chrono::Utc;
use futures_util::future::join_all;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{GeneratedSheet, GenerationRequest, SheetMetadata};

use super::cache::{CacheService, SHEET_CACHE_TTL_SECONDS};
use super::image_model::ImageModel;
use super::image_processor::{self, ImageProcessingError, OptimizeOptions, WatermarkOptions, THUMBNAIL_SIZE};
use super::object_store::{ObjectStore, ObjectStoreError};
use super::prompt_builder::{build_prompt, variation_prompt};

pub const BATCH_CHUNK_SIZE: usize = 5;
pub const BATCH_CHUNK_DELAY: Duration = Duration::from_secs(1);

/// Post-processed bytes of one variant, ready for upload.
struct ProcessedSheet {
    print: Vec<u8>,
    thumbnail: Vec<u8>,
    watermarked: Option<Vec<u8>>,
}

struct UploadedSheet {
    image_url: String,
    thumbnail_url: String,
    original_url: Option<String>,
}

/// Turns generation requests into stored worksheets, reusing cached results
/// for identical parameters.
pub struct SheetGenerator {
    model: Arc<dyn ImageModel>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<CacheService>,
    watermark_text: String,
}

impl SheetGenerator {
    pub fn new(
        model: Arc<dyn ImageModel>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<CacheService>,
        watermark_text: &str,
    ) -> Self {
        Self {
            model,
            store,
            cache,
            watermark_text: watermark_text.to_string(),
        }
    }

    /// Generate up to `request.count` sheets.
    ///
    /// Variants the model fails to produce are skipped, so the result may be
    /// shorter than requested. An object store failure ends the run with the
    /// sheets stored so far.
    pub async fn generate(&self, request: &GenerationRequest) -> Vec<GeneratedSheet> {
        let fingerprint = request.fingerprint();
        let count = request.count as usize;

        if request.use_cache {
            if let Some(sheets) = self.cached_sheets(&fingerprint, count).await {
                return sheets;
            }
        }

        let base_prompt = build_prompt(request);
        let batch_stamp = Utc::now().timestamp_millis();
        let mut sheets = Vec::with_capacity(count);

        for index in 0..count {
            let prompt = variation_prompt(&base_prompt, index);

            let image = match self.model.generate(&prompt).await {
                Ok(Some(image)) => image,
                Ok(None) => {
                    log::warn!("⚠️  No image returned for {} variant {}, skipping", fingerprint, index);
                    continue;
                }
                Err(e) => {
                    log::warn!("⚠️  Image model failed for {} variant {}: {}", fingerprint, index, e);
                    continue;
                }
            };

            let processed = match self.process(image.data, request.add_watermark).await {
                Ok(processed) => processed,
                Err(e) => {
                    log::warn!("⚠️  Could not process {} variant {}: {}", fingerprint, index, e);
                    continue;
                }
            };

            let uploaded = match self.upload(&processed, batch_stamp, index).await {
                Ok(uploaded) => uploaded,
                Err(e) => {
                    log::error!("❌ Storing {} variant {} failed, stopping: {}", fingerprint, index, e);
                    break;
                }
            };

            log::info!("✅ Stored {} variant {} at {}", fingerprint, index, uploaded.image_url);
            sheets.push(GeneratedSheet {
                image_url: uploaded.image_url,
                thumbnail_url: uploaded.thumbnail_url,
                original_url: uploaded.original_url,
                prompt,
                cached: false,
                metadata: SheetMetadata {
                    technique: request.technique.clone(),
                    theme: request.theme.clone(),
                    sub_theme: request.sub_theme.clone(),
                    age_group: request.age_group.clone(),
                    difficulty: request.difficulty,
                    generated_at: Utc::now(),
                    model_version: self.model.model_version().to_string(),
                },
            });
        }

        if request.use_cache && !sheets.is_empty() {
            if let Err(e) = self
                .cache
                .set(&fingerprint, &sheets, Some(SHEET_CACHE_TTL_SECONDS))
                .await
            {
                log::warn!("Failed to cache {}: {}", fingerprint, e);
            }
        }

        log::info!(
            "Generated {}/{} sheets for {}",
            sheets.len(),
            count,
            fingerprint
        );
        sheets
    }

    /// Run several requests, `BATCH_CHUNK_SIZE` at a time, pausing between
    /// chunks. Results are keyed by `technique_theme_subTheme`.
    pub async fn generate_batch(
        &self,
        requests: &[GenerationRequest],
    ) -> HashMap<String, Vec<GeneratedSheet>> {
        let mut results: HashMap<String, Vec<GeneratedSheet>> = HashMap::new();
        let chunks = (requests.len() + BATCH_CHUNK_SIZE - 1) / BATCH_CHUNK_SIZE;

        for (chunk_index, chunk) in requests.chunks(BATCH_CHUNK_SIZE).enumerate() {
            if chunk_index > 0 {
                tokio::time::sleep(BATCH_CHUNK_DELAY).await;
            }
            log::info!("Batch chunk {}/{} ({} requests)", chunk_index + 1, chunks, chunk.len());

            let outcomes = join_all(chunk.iter().map(|request| async move {
                (request.batch_key(), self.generate(request).await)
            }))
            .await;

            for (key, sheets) in outcomes {
                results.entry(key).or_default().extend(sheets);
            }
        }

        results
    }

    async fn cached_sheets(&self, fingerprint: &str, count: usize) -> Option<Vec<GeneratedSheet>> {
        match self.cache.get::<Vec<GeneratedSheet>>(fingerprint).await {
            Ok(Some(sheets)) if sheets.len() >= count => {
                log::info!("Cache hit for {} ({} stored, {} requested)", fingerprint, sheets.len(), count);
                Some(
                    sheets
                        .into_iter()
                        .take(count)
                        .map(|sheet| GeneratedSheet {
                            cached: true,
                            ..sheet
                        })
                        .collect(),
                )
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Cache read for {} failed: {}", fingerprint, e);
                None
            }
        }
    }

    async fn process(
        &self,
        raw: Vec<u8>,
        add_watermark: bool,
    ) -> Result<ProcessedSheet, ImageProcessingError> {
        let watermark_text = add_watermark.then(|| self.watermark_text.clone());

        tokio::task::spawn_blocking(move || -> Result<ProcessedSheet, ImageProcessingError> {
            let print = image_processor::optimize(&raw, &OptimizeOptions::print())?;
            let thumbnail = image_processor::create_thumbnail(&print, THUMBNAIL_SIZE)?;
            let watermarked = match watermark_text {
                Some(text) => Some(image_processor::add_watermark(
                    &print,
                    &text,
                    &WatermarkOptions::default(),
                )?),
                None => None,
            };
            Ok(ProcessedSheet {
                print,
                thumbnail,
                watermarked,
            })
        })
        .await
        .map_err(|e| ImageProcessingError::Render(format!("processing task failed: {}", e)))?
    }

    /// Upload one variant. If any upload fails, the objects already written
    /// for this variant are removed before the error is returned.
    async fn upload(
        &self,
        sheet: &ProcessedSheet,
        batch_stamp: i64,
        index: usize,
    ) -> Result<UploadedSheet, ObjectStoreError> {
        let digest = hex::encode(Sha256::digest(&sheet.print));
        let file_name = format!("{}_{}_{}", batch_stamp, index, &digest[..8]);

        let mut objects = vec![
            (format!("sheets/{}.png", file_name), &sheet.print),
            (format!("thumbnails/{}.png", file_name), &sheet.thumbnail),
        ];
        if let Some(watermarked) = &sheet.watermarked {
            objects.push((format!("sheets/{}_wm.png", file_name), watermarked));
        }

        let mut urls = Vec::with_capacity(objects.len());
        for (key, bytes) in &objects {
            match self.store.upload(bytes, key, "image/png").await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    for (stored_key, _) in &objects[..urls.len()] {
                        if let Err(cleanup_error) = self.store.delete(stored_key).await {
                            log::warn!("Failed to remove orphaned {}: {}", stored_key, cleanup_error);
                        }
                    }
                    return Err(e);
                }
            }
        }

        let mut urls = urls.into_iter();
        let (Some(print_url), Some(thumbnail_url)) = (urls.next(), urls.next()) else {
            return Err(ObjectStoreError::OperationFailed(
                "upload returned no URL".to_string(),
            ));
        };

        Ok(match urls.next() {
            Some(watermarked_url) => UploadedSheet {
                image_url: watermarked_url,
                thumbnail_url,
                original_url: Some(print_url),
            },
            None => UploadedSheet {
                image_url: print_url,
                thumbnail_url,
                original_url: None,
            },
        })
    }
}
