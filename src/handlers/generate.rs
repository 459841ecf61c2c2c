use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::handlers::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{GeneratedSheet, GenerationRequest};
use crate::services::cache::CacheService;
use crate::services::credit_gate::CreditGate;
use crate::services::sheet_generator::SheetGenerator;
use crate::utils::config::Config;
use crate::utils::validators::{validate_generation_request, MAX_BATCH_REQUESTS};

const GENERATE_ACTION: &str = "generate";
const GENERATION_LOCK_TTL_SECONDS: u64 = 300;
const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

// ============ Request/Response DTOs ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub sheets: Vec<GeneratedSheet>,
    pub credits_remaining: i64,
}

#[derive(Debug, Deserialize)]
pub struct BatchGenerateRequest {
    pub requests: Vec<GenerationRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGenerateResponse {
    pub results: HashMap<String, Vec<GeneratedSheet>>,
    pub credits_remaining: i64,
}

// ============ Handlers ============

/// POST /api/generate
pub async fn generate(
    user: AuthenticatedUser,
    body: web::Json<GenerationRequest>,
    config: web::Data<Config>,
    cache: web::Data<CacheService>,
    credits: web::Data<CreditGate>,
    generator: web::Data<SheetGenerator>,
) -> Result<impl Responder, ApiError> {
    let request = body.into_inner();
    validate_generation_request(&request).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    enforce_rate_limit(&cache, &config, &user.user_id).await?;
    let available = credits.check(&user.user_id, request.count).await?;

    log::info!(
        "User {} requested {} x {}",
        user.user_id,
        request.count,
        request.fingerprint()
    );

    let lock = GenerationLock::acquire(&cache, &user.user_id).await?;
    let sheets = generator.generate(&request).await;
    lock.release(&cache).await;

    let credits_remaining = settle(&cache, &credits, &user.user_id, available, &sheets).await;

    Ok(HttpResponse::Ok().json(GenerateResponse {
        sheets,
        credits_remaining,
    }))
}

/// POST /api/generate/batch
pub async fn generate_batch(
    user: AuthenticatedUser,
    body: web::Json<BatchGenerateRequest>,
    config: web::Data<Config>,
    cache: web::Data<CacheService>,
    credits: web::Data<CreditGate>,
    generator: web::Data<SheetGenerator>,
) -> Result<impl Responder, ApiError> {
    let requests = body.into_inner().requests;
    if requests.is_empty() || requests.len() > MAX_BATCH_REQUESTS {
        return Err(ApiError::BadRequest(format!(
            "requests must contain between 1 and {} entries",
            MAX_BATCH_REQUESTS
        )));
    }
    for (index, request) in requests.iter().enumerate() {
        validate_generation_request(request)
            .map_err(|e| ApiError::BadRequest(format!("requests[{}]: {}", index, e)))?;
    }

    enforce_rate_limit(&cache, &config, &user.user_id).await?;
    let required: u32 = requests.iter().map(|request| request.count).sum();
    let available = credits.check(&user.user_id, required).await?;

    log::info!(
        "User {} requested a batch of {} ({} sheets)",
        user.user_id,
        requests.len(),
        required
    );

    let lock = GenerationLock::acquire(&cache, &user.user_id).await?;
    let results = generator.generate_batch(&requests).await;
    lock.release(&cache).await;

    let all_sheets: Vec<GeneratedSheet> = results.values().flatten().cloned().collect();
    let credits_remaining = settle(&cache, &credits, &user.user_id, available, &all_sheets).await;

    Ok(HttpResponse::Ok().json(BatchGenerateResponse {
        results,
        credits_remaining,
    }))
}

// ============ Helpers ============

fn generation_scope(user_id: &str) -> String {
    format!("{}:{}", GENERATE_ACTION, user_id)
}

async fn enforce_rate_limit(cache: &CacheService, config: &Config, user_id: &str) -> Result<(), ApiError> {
    let status = cache
        .rate_limit(
            &generation_scope(user_id),
            config.rate_limit_per_minute,
            RATE_LIMIT_WINDOW_SECONDS,
        )
        .await;
    if !status.allowed {
        log::info!("Rate limited user {} for {}s", user_id, status.reset_in_seconds);
        return Err(ApiError::RateLimited {
            retry_after: status.reset_in_seconds,
        });
    }
    Ok(())
}

/// Per-user generation lock. An unreachable store does not block generation.
struct GenerationLock {
    // scope and ownership token, absent when the store was unreachable
    held: Option<(String, String)>,
}

impl GenerationLock {
    async fn acquire(cache: &CacheService, user_id: &str) -> Result<Self, ApiError> {
        let scope = generation_scope(user_id);
        match cache.acquire_lock(&scope, GENERATION_LOCK_TTL_SECONDS).await {
            Ok(Some(token)) => Ok(Self {
                held: Some((scope, token)),
            }),
            Ok(None) => Err(ApiError::Busy),
            Err(e) => {
                log::warn!("Could not take generation lock for {}: {}", user_id, e);
                Ok(Self { held: None })
            }
        }
    }

    async fn release(self, cache: &CacheService) {
        if let Some((scope, token)) = self.held {
            match cache.release_lock(&scope, &token).await {
                Ok(true) => {}
                Ok(false) => log::warn!("Lock {} expired before generation finished", scope),
                Err(e) => log::warn!("Failed to release lock {}: {}", scope, e),
            }
        }
    }
}

/// Charge for freshly generated sheets, record usage and return the balance.
async fn settle(
    cache: &CacheService,
    credits: &CreditGate,
    user_id: &str,
    available: i64,
    sheets: &[GeneratedSheet],
) -> i64 {
    let fresh = sheets.iter().filter(|sheet| !sheet.cached).count() as u32;

    let remaining = match credits.consume(user_id, fresh).await {
        Ok(remaining) => remaining,
        Err(e) => {
            log::error!("Failed to charge {} credits to {}: {}", fresh, user_id, e);
            (available - fresh as i64).max(0)
        }
    };

    if !sheets.is_empty() {
        if let Err(e) = cache
            .track_usage(user_id, GENERATE_ACTION, sheets.len() as i64)
            .await
        {
            log::warn!("Failed to record usage for {}: {}", user_id, e);
        }
    }

    remaining
}
