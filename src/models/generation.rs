use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{AgeGroup, Technique, Theme};

fn default_count() -> u32 {
    1
}

fn default_use_cache() -> bool {
    true
}

/// Parameters of one worksheet generation call, as posted by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub technique: Technique,
    pub theme: Theme,
    pub sub_theme: String,
    pub age_group: AgeGroup,
    pub difficulty: u8,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub additional_details: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    #[serde(default)]
    pub add_watermark: bool,
}

impl GenerationRequest {
    /// Cache key shared by every request with the same technique, theme,
    /// sub-theme, age group and difficulty.
    pub fn fingerprint(&self) -> String {
        format!(
            "sheet:{}:{}:{}:{}:{}",
            self.technique.id(),
            self.theme.id(),
            self.sub_theme,
            self.age_group.id(),
            self.difficulty
        )
    }

    /// Key under which batch results are reported.
    pub fn batch_key(&self) -> String {
        format!("{}_{}_{}", self.technique.id(), self.theme.id(), self.sub_theme)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMetadata {
    pub technique: Technique,
    pub theme: Theme,
    pub sub_theme: String,
    pub age_group: AgeGroup,
    pub difficulty: u8,
    pub generated_at: DateTime<Utc>,
    pub model_version: String,
}

/// A single printable worksheet image plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSheet {
    pub image_url: String,
    pub thumbnail_url: String,
    // Only present when a watermarked copy was uploaded as `image_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    pub prompt: String,
    pub cached: bool,
    pub metadata: SheetMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn sample_request() -> GenerationRequest {
        GenerationRequest {
            technique: Technique::Coloring,
            theme: Theme::Animals,
            sub_theme: "pets".to_string(),
            age_group: AgeGroup::LowerElem,
            difficulty: 3,
            style: None,
            additional_details: None,
            count: 2,
            use_cache: false,
            add_watermark: false,
        }
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(
            sample_request().fingerprint(),
            "sheet:COLORING:ANIMALS:pets:LOWER_ELEM:3"
        );
    }

    #[test]
    fn test_fingerprint_ignores_non_identity_fields() {
        let mut other = sample_request();
        other.count = 5;
        other.use_cache = true;
        other.style = Some("cartoon".to_string());
        assert_eq!(other.fingerprint(), sample_request().fingerprint());
    }

    #[test]
    fn test_batch_key() {
        assert_eq!(sample_request().batch_key(), "COLORING_ANIMALS_pets");
    }

    #[test]
    fn test_request_defaults() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{"technique":"MANDALA","theme":"SPACE","subTheme":"planets","ageGroup":"ADULT","difficulty":5}"#,
        )
        .unwrap();

        assert_eq!(request.count, 1);
        assert!(request.use_cache);
        assert!(!request.add_watermark);
        assert_eq!(request.style, None);
    }

    #[test]
    fn test_sheet_omits_missing_original_url() {
        let sheet = GeneratedSheet {
            image_url: "http://files/sheets/a.png".to_string(),
            thumbnail_url: "http://files/thumbnails/a.png".to_string(),
            original_url: None,
            prompt: "draw".to_string(),
            cached: false,
            metadata: SheetMetadata {
                technique: Technique::Coloring,
                theme: Theme::Animals,
                sub_theme: "pets".to_string(),
                age_group: AgeGroup::LowerElem,
                difficulty: 3,
                generated_at: Utc::now(),
                model_version: "test-model".to_string(),
            },
        };

        let value = serde_json::to_value(&sheet).unwrap();
        assert!(value.get("originalUrl").is_none());
        assert_eq!(value["metadata"]["subTheme"], "pets");
        assert_eq!(value["metadata"]["technique"], "COLORING");
    }
}
