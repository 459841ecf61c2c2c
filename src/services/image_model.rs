use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request to image model failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image model returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("could not decode image model response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Text-to-image model used for worksheet generation.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Generate one image for `prompt`. `Ok(None)` means the model answered
    /// without an image part.
    async fn generate(&self, prompt: &str) -> Result<Option<GeneratedImage>, ModelError>;

    /// Version string recorded in sheet metadata.
    fn model_version(&self) -> &str;
}

pub struct GeminiImageModel {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiImageModel {
    pub fn new(client: Client, api_key: &str, api_base: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl ImageModel for GeminiImageModel {
    async fn generate(&self, prompt: &str) -> Result<Option<GeneratedImage>, ModelError> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"]
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            log::error!("Gemini API error {}: {}", status, truncate(&response_text, 500));
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: truncate(&response_text, 500),
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| ModelError::Decode(format!("unexpected response body: {}", e)))?;

        extract_first_image(parsed)
    }

    fn model_version(&self) -> &str {
        &self.model
    }
}

/// First `inlineData` part carrying an `image/*` payload, base64-decoded.
fn extract_first_image(response: GeminiResponse) -> Result<Option<GeneratedImage>, ModelError> {
    let inline = response
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.map(|c| c.parts).unwrap_or_default())
        .filter_map(|part| part.inline_data)
        .find(|inline| inline.mime_type.starts_with("image/"));

    let Some(inline) = inline else {
        return Ok(None);
    };

    let data = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| ModelError::Decode(format!("invalid base64 image data: {}", e)))?;

    Ok(Some(GeneratedImage {
        data,
        mime_type: inline.mime_type,
    }))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

// Gemini API response types

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    inline_data: Option<GeminiInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_extracts_first_image_part() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"png-bytes");
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your worksheet" },
                        { "inlineData": { "mimeType": "text/plain", "data": "aGk=" } },
                        { "inlineData": { "mimeType": "image/png", "data": encoded } }
                    ]
                }
            }]
        }));

        let image = extract_first_image(response).unwrap().unwrap();
        assert_eq!(image.data, b"png-bytes");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_text_only_response_has_no_image() {
        let response = parse(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't draw that" }] } }]
        }));
        assert_eq!(extract_first_image(response).unwrap(), None);
    }

    #[test]
    fn test_blocked_response_has_no_image() {
        let response = parse(serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }));
        assert_eq!(extract_first_image(response).unwrap(), None);

        let response = parse(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }));
        assert_eq!(extract_first_image(response).unwrap(), None);
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "!!!" } }] }
            }]
        }));
        assert!(matches!(extract_first_image(response), Err(ModelError::Decode(_))));
    }

    #[test]
    fn test_endpoint_and_version() {
        let model = GeminiImageModel::new(
            Client::new(),
            "key",
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-2.5-flash-image",
        );
        assert_eq!(
            model.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(model.model_version(), "gemini-2.5-flash-image");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
