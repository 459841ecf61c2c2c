pub mod catalog;
pub mod credits;
pub mod files;
pub mod generate;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse, ResponseError};
use thiserror::Error;

use crate::services::cache::CacheError;
use crate::services::credit_gate::CreditError;
use crate::services::object_store::ObjectStoreError;

/// Errors returned by the HTTP handlers, rendered as `{ "error": message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i64, available: i64 },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("A generation is already in progress for this account")]
    Busy,
    #[error("Too many requests, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::RateLimited { retry_after } = self {
            response.insert_header((header::RETRY_AFTER, retry_after.to_string()));
        }
        response.json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<CreditError> for ApiError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::InsufficientCredits {
                required,
                available,
            } => ApiError::InsufficientCredits {
                required,
                available,
            },
            CreditError::Cache(e) => e.into(),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        log::error!("Cache error: {}", err);
        ApiError::Internal("Storage unavailable".to_string())
    }
}

impl From<ObjectStoreError> for ApiError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::InvalidKey(key) => ApiError::BadRequest(format!("Invalid object key: {}", key)),
            ObjectStoreError::OperationFailed(message) => {
                log::error!("Object store error: {}", message);
                ApiError::Internal("File storage unavailable".to_string())
            }
        }
    }
}

/// Register every route. Shared state is expected as app data:
/// `Config`, `CacheService`, `CreditGate`, `SheetGenerator` and `dyn ObjectStore`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(256 * 1024)
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/generate", web::post().to(generate::generate))
            .route("/generate/batch", web::post().to(generate::generate_batch))
            .route("/credits", web::get().to(credits::get_credits))
            .route("/usage", web::get().to(credits::get_usage))
            .route("/catalog", web::get().to(catalog::get_catalog))
            .route("/files/signed-url", web::get().to(files::create_signed_url)),
    )
    .service(
        web::scope("/files")
            .route("/signed/{token}", web::get().to(files::serve_signed))
            .route("/{key:.*}", web::get().to(files::serve_file)),
    );
}
