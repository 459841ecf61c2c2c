use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims of the bearer tokens issued by the auth provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // expiration timestamp
    pub iat: i64,    // issued at timestamp
}

impl Claims {
    pub fn new(user_id: &str, expiration_hours: i64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiration_hours)).timestamp();

        Self {
            sub: user_id.to_string(),
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Claims embedded in a signed object URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectClaims {
    pub key: String,
    pub exp: i64,
}

#[allow(dead_code)]
pub fn create_jwt(user_id: &str, secret: &str, expiration_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, expiration_hours);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn create_object_token(key: &str, secret: &str, ttl_seconds: u64) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = ObjectClaims {
        key: key.to_string(),
        exp: (Utc::now() + Duration::seconds(ttl_seconds as i64)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_object_token(token: &str, secret: &str) -> Result<ObjectClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    // Signed links expire exactly when they say they do
    validation.leeway = 0;
    let token_data = decode::<ObjectClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}
