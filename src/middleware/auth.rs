use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::handlers::ApiError;
use crate::utils::auth::decode_jwt;
use crate::utils::config::Config;

/// Caller identified by a valid `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_user_from_request(req))
    }
}

pub fn extract_user_from_request(req: &HttpRequest) -> Result<AuthenticatedUser, ApiError> {
    let config = req.app_data::<web::Data<Config>>().ok_or_else(|| {
        log::error!("Config is not registered as app data");
        ApiError::Internal("Server misconfigured".to_string())
    })?;

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization format".to_string()))?;

    let claims = decode_jwt(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    if claims.sub.trim().is_empty() {
        return Err(ApiError::Unauthorized("Invalid user ID in token".to_string()));
    }

    Ok(AuthenticatedUser { user_id: claims.sub })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::test_config;
    use crate::utils::auth::create_jwt;
    use actix_web::test::TestRequest;

    fn request_with(header: Option<String>) -> HttpRequest {
        let mut req = TestRequest::default().app_data(web::Data::new(test_config()));
        if let Some(value) = header {
            req = req.insert_header(("Authorization", value));
        }
        req.to_http_request()
    }

    #[test]
    fn test_valid_token() {
        let token = create_jwt("user_42", &test_config().jwt_secret, 1).unwrap();
        let user = extract_user_from_request(&request_with(Some(format!("Bearer {}", token)))).unwrap();
        assert_eq!(user.user_id, "user_42");
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(matches!(
            extract_user_from_request(&request_with(None)),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_user_from_request(&request_with(Some("Token abc".to_string()))),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_token_signed_with_other_secret() {
        let token = create_jwt("user_42", "another-secret", 1).unwrap();
        assert!(matches!(
            extract_user_from_request(&request_with(Some(format!("Bearer {}", token)))),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
