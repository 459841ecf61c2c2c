use anyhow::{anyhow, Result};
use url::Url;

use crate::models::GenerationRequest;

pub const MAX_SHEETS_PER_REQUEST: u32 = 10;
pub const MAX_BATCH_REQUESTS: usize = 20;
const MAX_SUB_THEME_CHARS: usize = 100;
const MAX_STYLE_CHARS: usize = 100;
const MAX_DETAILS_CHARS: usize = 500;
// Separates the parts of a sheet fingerprint
const KEY_SEPARATOR: char = ':';

/// Validate that a string is a valid URL with http or https scheme
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| anyhow!("Invalid URL format: {}", e))?;

    // Only allow http and https schemes
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!(
            "URL must use http or https scheme, got: {}",
            url.scheme()
        ));
    }

    // Must have a host
    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a host"));
    }

    Ok(url)
}

/// Check the user-supplied parts of a generation request.
pub fn validate_generation_request(request: &GenerationRequest) -> Result<()> {
    if !(1..=5).contains(&request.difficulty) {
        return Err(anyhow!("difficulty must be between 1 and 5"));
    }

    if !(1..=MAX_SHEETS_PER_REQUEST).contains(&request.count) {
        return Err(anyhow!(
            "count must be between 1 and {}",
            MAX_SHEETS_PER_REQUEST
        ));
    }

    let sub_theme = request.sub_theme.trim();
    if sub_theme.is_empty() {
        return Err(anyhow!("subTheme is required"));
    }
    check_length("subTheme", sub_theme, MAX_SUB_THEME_CHARS)?;
    check_no_separator("subTheme", sub_theme)?;

    if let Some(style) = &request.style {
        check_length("style", style, MAX_STYLE_CHARS)?;
    }
    if let Some(details) = &request.additional_details {
        check_length("additionalDetails", details, MAX_DETAILS_CHARS)?;
    }

    for (field, id) in [
        ("technique", request.technique.id()),
        ("theme", request.theme.id()),
        ("ageGroup", request.age_group.id()),
    ] {
        if id.trim().is_empty() {
            return Err(anyhow!("{} is required", field));
        }
        check_no_separator(field, id)?;
    }

    Ok(())
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(anyhow!("{} must be at most {} characters", field, max));
    }
    Ok(())
}

fn check_no_separator(field: &str, value: &str) -> Result<()> {
    if value.contains(KEY_SEPARATOR) {
        return Err(anyhow!("{} must not contain '{}'", field, KEY_SEPARATOR));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeGroup, Technique, Theme};

    fn request() -> GenerationRequest {
        GenerationRequest {
            technique: Technique::Coloring,
            theme: Theme::Animals,
            sub_theme: "pets".to_string(),
            age_group: AgeGroup::LowerElem,
            difficulty: 3,
            style: None,
            additional_details: None,
            count: 2,
            use_cache: true,
            add_watermark: false,
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://cdn.example.com").is_ok());
        assert!(validate_url("http://localhost:8080/files").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not-a-url").is_err());
    }

    #[test]
    fn test_valid_request() {
        assert!(validate_generation_request(&request()).is_ok());
    }

    #[test]
    fn test_difficulty_bounds() {
        for difficulty in [0, 6] {
            let mut req = request();
            req.difficulty = difficulty;
            assert!(validate_generation_request(&req).is_err());
        }
    }

    #[test]
    fn test_count_bounds() {
        for count in [0, MAX_SHEETS_PER_REQUEST + 1] {
            let mut req = request();
            req.count = count;
            assert!(validate_generation_request(&req).is_err());
        }
        let mut req = request();
        req.count = MAX_SHEETS_PER_REQUEST;
        assert!(validate_generation_request(&req).is_ok());
    }

    #[test]
    fn test_text_fields() {
        let mut req = request();
        req.sub_theme = "   ".to_string();
        assert!(validate_generation_request(&req).is_err());

        let mut req = request();
        req.style = Some("x".repeat(101));
        assert!(validate_generation_request(&req).is_err());

        let mut req = request();
        req.additional_details = Some("é".repeat(500));
        assert!(validate_generation_request(&req).is_ok());
        req.additional_details = Some("é".repeat(501));
        assert!(validate_generation_request(&req).is_err());
    }

    #[test]
    fn test_custom_ids_are_accepted() {
        let mut req = request();
        req.technique = Technique::Custom("WATERCOLOR".to_string());
        assert!(validate_generation_request(&req).is_ok());

        req.theme = Theme::Custom(String::new());
        assert!(validate_generation_request(&req).is_err());
    }

    #[test]
    fn test_separator_is_rejected() {
        // "A:B" + "C" and "A" + "B:C" would share one cache entry
        let mut req = request();
        req.sub_theme = "pets:LOWER_ELEM".to_string();
        assert!(validate_generation_request(&req).is_err());

        let mut req = request();
        req.theme = Theme::Custom("SPACE:rockets".to_string());
        assert!(validate_generation_request(&req).is_err());

        let mut req = request();
        req.technique = Technique::Custom("INK:".to_string());
        assert!(validate_generation_request(&req).is_err());

        let mut req = request();
        req.age_group = AgeGroup::Custom("ADULT:1".to_string());
        assert!(validate_generation_request(&req).is_err());
    }
}
