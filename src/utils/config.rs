use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::utils::validators::validate_url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub storage_dir: PathBuf,
    pub public_base_url: String,
    pub redis_url: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub default_credits: u32,
    pub rate_limit_per_minute: i64,
    pub watermark_text: String,
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("PORT", var("PORT"), 8080u16)?;

        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}/files", host, port));
        validate_url(&public_base_url).map_err(|_| ConfigError::Invalid {
            name: "PUBLIC_BASE_URL",
            value: public_base_url.clone(),
        })?;

        let rate_limit_per_minute = parse_or("RATE_LIMIT_PER_MINUTE", var("RATE_LIMIT_PER_MINUTE"), 10i64)?;
        if rate_limit_per_minute < 1 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_PER_MINUTE",
                value: rate_limit_per_minute.to_string(),
            });
        }

        Ok(Config {
            port,
            jwt_secret: required("JWT_SECRET")?,
            storage_dir: PathBuf::from(var("STORAGE_DIR").unwrap_or_else(|| "storage".to_string())),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            redis_url: var("REDIS_URL"),
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash-image".to_string()),
            gemini_api_base: var("GEMINI_API_BASE")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            default_credits: parse_or("DEFAULT_CREDITS", var("DEFAULT_CREDITS"), 30u32)?,
            rate_limit_per_minute,
            watermark_text: var("WATERMARK_TEXT").unwrap_or_else(|| "ArtSheet Studio".to_string()),
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            host,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
