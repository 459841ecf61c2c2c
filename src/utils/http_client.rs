use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Image generation routinely takes tens of seconds per call
const GENERATION_TIMEOUT_SECS: u64 = 120;

/// Create a configured HTTP client for calls to the image model API
pub fn create_http_client() -> reqwest::Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(GENERATION_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("artsheet-backend/", env!("CARGO_PKG_VERSION")))
        .build()
}
