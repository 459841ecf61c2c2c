use actix_web::{web, HttpResponse, Responder};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::handlers::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::cache::CacheService;
use crate::services::credit_gate::CreditGate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    pub credits_remaining: i64,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub date: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub date: String,
    pub action: String,
    pub count: i64,
}

/// GET /api/credits
pub async fn get_credits(
    user: AuthenticatedUser,
    credits: web::Data<CreditGate>,
) -> Result<impl Responder, ApiError> {
    let credits_remaining = credits.remaining(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(CreditsResponse { credits_remaining }))
}

/// GET /api/usage?date=YYYY-MM-DD&action=generate
pub async fn get_usage(
    user: AuthenticatedUser,
    query: web::Query<UsageQuery>,
    cache: web::Data<CacheService>,
) -> Result<impl Responder, ApiError> {
    let query = query.into_inner();

    let date = match query.date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest("date must be formatted as YYYY-MM-DD".to_string()))?,
        None => Utc::now().date_naive(),
    };
    let date = date.format("%Y-%m-%d").to_string();

    let action = query
        .action
        .filter(|action| !action.trim().is_empty())
        .unwrap_or_else(|| "generate".to_string());
    if !action.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ApiError::BadRequest("Invalid action".to_string()));
    }

    let count = cache.get_usage(&user.user_id, &date, &action).await?;
    Ok(HttpResponse::Ok().json(UsageResponse {
        date,
        action,
        count,
    }))
}
