use actix_web::{http::header, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::handlers::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::object_store::{content_type_for_key, ObjectStore};
use crate::utils::auth::decode_object_token;
use crate::utils::config::Config;

const DEFAULT_SIGNED_URL_TTL: u64 = 3600;
const MAX_SIGNED_URL_TTL: u64 = 86400;

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub key: String,
    pub ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

/// GET /api/files/signed-url?key=...&ttl=...
pub async fn create_signed_url(
    user: AuthenticatedUser,
    query: web::Query<SignedUrlQuery>,
    store: web::Data<dyn ObjectStore>,
) -> Result<impl Responder, ApiError> {
    let query = query.into_inner();
    let ttl = query.ttl.unwrap_or(DEFAULT_SIGNED_URL_TTL);
    if ttl == 0 || ttl > MAX_SIGNED_URL_TTL {
        return Err(ApiError::BadRequest(format!(
            "ttl must be between 1 and {} seconds",
            MAX_SIGNED_URL_TTL
        )));
    }

    let url = store.signed_url(&query.key, ttl)?;
    log::debug!("Signed {} for user {} ({}s)", query.key, user.user_id, ttl);

    Ok(HttpResponse::Ok().json(SignedUrlResponse {
        url,
        expires_in: ttl,
    }))
}

/// GET /files/signed/{token}
/// Serve the object named in a valid, unexpired signed token
pub async fn serve_signed(
    path: web::Path<String>,
    config: web::Data<Config>,
    store: web::Data<dyn ObjectStore>,
) -> Result<impl Responder, ApiError> {
    let token = path.into_inner();
    let claims = decode_object_token(&token, &config.jwt_secret)
        .map_err(|_| ApiError::Forbidden("Invalid or expired link".to_string()))?;

    object_response(store.get_ref(), &claims.key, "private").await
}

/// GET /files/{key}
/// Public URL target for stored sheets and thumbnails
pub async fn serve_file(
    path: web::Path<String>,
    store: web::Data<dyn ObjectStore>,
) -> Result<impl Responder, ApiError> {
    let key = path.into_inner();
    object_response(store.get_ref(), &key, "public, max-age=86400").await
}

async fn object_response(
    store: &dyn ObjectStore,
    key: &str,
    cache_control: &str,
) -> Result<HttpResponse, ApiError> {
    let bytes = store
        .download(key)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for_key(key))
        .insert_header((header::CACHE_CONTROL, cache_control.to_string()))
        .body(bytes))
}
